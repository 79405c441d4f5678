/// 生成限时访问 URL，由对象存储侧实现
pub trait UrlSigner: Send + Sync {
    fn sign(&self, object_key: &str) -> String;
}
