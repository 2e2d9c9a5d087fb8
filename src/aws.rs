//! AWS SDK configuration
//!
//! Region and static keys from the `credentials` block take precedence over
//! the default provider chain (environment, profile, instance role).

use crate::config::Credentials;
use aws_config::{BehaviorVersion, Region};

pub async fn sdk_config(credentials: &Credentials) -> aws_config::SdkConfig {
    let mut loader = aws_config::defaults(BehaviorVersion::latest());
    if let Some(region) = credentials.region() {
        loader = loader.region(Region::new(region.to_string()));
    }
    if let Some((access_key_id, secret_access_key)) = credentials.access_key() {
        tracing::debug!("Using static AWS credentials {access_key_id}");
        loader = loader.credentials_provider(aws_sdk_sqs::config::Credentials::new(
            access_key_id,
            secret_access_key,
            None,
            None,
            "rin-config",
        ));
    }
    loader.load().await
}
