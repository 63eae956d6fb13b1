use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::api::{otp::Code, sms::Sms, voter::VoterRegistrationSpec};
use crate::Config;

#[cfg(test)]
const TEST_CAPTCHA_RESPONSE: &str = "this response will succeed in test mode";

#[cfg(not(test))]
const SITEVERIFY_URL: &str = "https://www.google.com/recaptcha/api/siteverify";

#[cfg(not(test))]
const SITEVERIFY_TIMEOUT_SECS: u64 = 10;

/// A request for an OTP challenge against a specific SMS number, guarded by
/// reCAPTCHA so the SMS send cannot be scripted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoterChallengeRequest {
    sms: Sms, // Deliberately not public, so it can only be extracted via `verify()`
    recaptcha_response: String,
}

impl VoterChallengeRequest {
    /// Verify the CAPTCHA, revealing the SMS if successful.
    /// This can only be attempted once, due to the reCAPTCHA API.
    #[cfg(test)]
    pub async fn verify(self, _config: &Config) -> Result<Sms, RecaptchaError> {
        // In test mode, just check the dummy value is equal to some string.
        if self.recaptcha_response == TEST_CAPTCHA_RESPONSE {
            Ok(self.sms)
        } else {
            Err(RecaptchaError::Rejected)
        }
    }

    /// Verify the CAPTCHA, revealing the SMS if successful.
    /// This can only be attempted once, due to the reCAPTCHA API.
    #[cfg(not(test))]
    pub async fn verify(self, config: &Config) -> Result<Sms, RecaptchaError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(SITEVERIFY_TIMEOUT_SECS))
            .build()?;
        let response: SiteverifyResponse = client
            .post(SITEVERIFY_URL)
            .form(&[
                ("secret", config.recaptcha_secret()),
                ("response", self.recaptcha_response.as_str()),
            ])
            .send()
            .await?
            .json()
            .await?;

        if !response.success {
            return Err(RecaptchaError::Rejected);
        }
        match response.hostname {
            Some(hostname) if hostname != config.hostname() => {
                Err(RecaptchaError::WrongHostname(hostname))
            }
            _ => Ok(self.sms),
        }
    }
}

/// The parts of the reCAPTCHA verification response we care about.
#[cfg(not(test))]
#[derive(Debug, Deserialize)]
struct SiteverifyResponse {
    success: bool,
    hostname: Option<String>,
}

#[derive(Debug, Error)]
pub enum RecaptchaError {
    #[error("reCAPTCHA verification call failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("reCAPTCHA response was rejected")]
    Rejected,
    #[error("reCAPTCHA response came from unexpected hostname '{0}'")]
    WrongHostname(String),
}

/// Submission of an OTP code together with the registration it completes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoterVerifyRequest {
    pub code: Code,
    pub registration: VoterRegistrationSpec,
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl VoterChallengeRequest {
        pub fn example() -> Self {
            Self {
                sms: Sms::example(),
                recaptcha_response: TEST_CAPTCHA_RESPONSE.to_string(),
            }
        }

        pub fn example_invalid() -> Self {
            Self {
                sms: Sms::example(),
                recaptcha_response: "not valid".to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[rocket::async_test]
    async fn test_mode_captcha_accepts_only_the_fixture() {
        let config = Config::example();
        assert!(VoterChallengeRequest::example()
            .verify(&config)
            .await
            .is_ok());
        assert!(matches!(
            VoterChallengeRequest::example_invalid().verify(&config).await,
            Err(RecaptchaError::Rejected)
        ));
    }
}
