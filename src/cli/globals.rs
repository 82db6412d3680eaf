use secrecy::SecretString;
use std::path::PathBuf;

/// Where uploaded images end up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaStrategy {
    /// Files written under `upload_dir`, served back from `/images/*`.
    Local,
    /// Files streamed to the cloud image host, secure URL stored verbatim.
    Cloud,
}

#[derive(Debug, Clone)]
pub struct GlobalArgs {
    pub token_secret: SecretString,
    pub media_strategy: MediaStrategy,
    pub upload_dir: PathBuf,
    pub cloud_name: String,
    pub cloud_api_key: String,
    pub cloud_api_secret: SecretString,
    pub cloud_folder: String,
}

impl GlobalArgs {
    #[must_use]
    pub fn new(token_secret: SecretString) -> Self {
        Self {
            token_secret,
            media_strategy: MediaStrategy::Local,
            upload_dir: PathBuf::from("./images"),
            cloud_name: String::new(),
            cloud_api_key: String::new(),
            cloud_api_secret: SecretString::default(),
            cloud_folder: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_global_args() {
        let args = GlobalArgs::new(SecretString::from("s3cret".to_string()));
        assert_eq!(args.token_secret.expose_secret(), "s3cret");
        assert_eq!(args.media_strategy, MediaStrategy::Local);
        assert_eq!(args.upload_dir, PathBuf::from("./images"));
        assert_eq!(args.cloud_api_secret.expose_secret(), "");
    }
}
