use std::fmt;

use aws_config::Region;
use aws_sdk_sts::config::Credentials;
use chrono::{DateTime, Utc};
use log::debug;

use crate::error::{Error, Result};

/// Durable IAM user keys read from a long-term profile.
#[derive(Clone)]
pub struct LongTermCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub region: String,
}

impl LongTermCredentials {
    async fn sdk_config(&self) -> aws_config::SdkConfig {
        let credentials = Credentials::new(
            &self.access_key_id,
            &self.secret_access_key,
            None,
            None,
            "opskit",
        );
        aws_config::from_env()
            .credentials_provider(credentials)
            .region(Region::new(self.region.clone()))
            .load()
            .await
    }
}

impl fmt::Debug for LongTermCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LongTermCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"** redacted **")
            .field("region", &self.region)
            .finish()
    }
}

/// Short-term credentials issued by STS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
    pub expiration: DateTime<Utc>,
}

/// Remote identity operations needed to turn long-term keys into a session.
pub trait IdentityService {
    /// Serial numbers of the MFA devices registered for the calling user.
    async fn list_mfa_devices(&self, credentials: &LongTermCredentials) -> Result<Vec<String>>;

    async fn get_session_token(
        &self,
        credentials: &LongTermCredentials,
        device: &str,
        code: &str,
        duration: Option<u32>,
    ) -> Result<SessionCredentials>;
}

/// [`IdentityService`] backed by the AWS SDK.
pub struct AwsIdentity;

impl IdentityService for AwsIdentity {
    async fn list_mfa_devices(&self, credentials: &LongTermCredentials) -> Result<Vec<String>> {
        let config = credentials.sdk_config().await;
        let output = aws_sdk_iam::Client::new(&config)
            .list_mfa_devices()
            .send()
            .await
            .map_err(|e| {
                Error::MfaDeviceListing(aws_sdk_iam::error::DisplayErrorContext(e).to_string())
            })?;

        let devices: Vec<String> = output
            .mfa_devices()
            .iter()
            .map(|device| device.serial_number().to_string())
            .collect();
        debug!("Found {} MFA device(s)", devices.len());
        Ok(devices)
    }

    async fn get_session_token(
        &self,
        credentials: &LongTermCredentials,
        device: &str,
        code: &str,
        duration: Option<u32>,
    ) -> Result<SessionCredentials> {
        let config = credentials.sdk_config().await;
        let output = aws_sdk_sts::Client::new(&config)
            .get_session_token()
            .set_duration_seconds(duration.map(|d| d as i32))
            .serial_number(device)
            .token_code(code)
            .send()
            .await
            .map_err(|e| {
                Error::TokenIssuance(aws_sdk_sts::error::DisplayErrorContext(e).to_string())
            })?;

        let session = output
            .credentials()
            .ok_or_else(|| Error::TokenIssuance("No credentials returned".to_string()))?;
        let expiration = session.expiration();
        let expiration = DateTime::from_timestamp(expiration.secs(), expiration.subsec_nanos())
            .ok_or_else(|| {
                Error::TokenIssuance(format!("Expiration out of range: {expiration}"))
            })?;

        Ok(SessionCredentials {
            access_key_id: session.access_key_id().to_string(),
            secret_access_key: session.secret_access_key().to_string(),
            session_token: session.session_token().to_string(),
            expiration,
        })
    }
}
