use clap::Parser;
use url::Url;

use crate::server::ServerOptions;

#[derive(Parser, Debug)]
#[command(name = "zipfly")]
#[command(version)]
#[command(about = "Stream ZIP archives of remote files to HTTP clients", long_about = None)]
#[command(after_help = "Every option can also be set through the environment variable shown.\n\n\
Examples:\n  \
  zipfly --port 8080\n  \
  ENVIRONMENT=production SIGNING_SECRET=... PUBLIC_URL=https://zip.example.com zipfly")]
pub struct Cli {
    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 6969)]
    pub port: u16,

    /// Externally visible base URL, used to verify signed GET requests
    /// [default: http://localhost:<port>]
    #[arg(long, env = "PUBLIC_URL")]
    pub public_url: Option<String>,

    /// Deployment environment; "production" enforces request signatures
    #[arg(long, env = "ENVIRONMENT", default_value = "development")]
    pub environment: String,

    /// Require request signatures in any environment (any non-empty value)
    #[arg(long, env = "VALIDATE_SIGNATURE", value_name = "ANY")]
    pub validate_signature: Option<String>,

    /// Shared secret for request signatures
    #[arg(long, env = "SIGNING_SECRET", default_value = "", hide_env_values = true)]
    pub signing_secret: String,
}

impl Cli {
    pub fn public_url(&self) -> anyhow::Result<Url> {
        let raw = match self.public_url.as_deref().filter(|s| !s.is_empty()) {
            Some(url) => url.to_string(),
            None => format!("http://localhost:{}", self.port),
        };
        Url::parse(&raw).map_err(|e| anyhow::anyhow!("invalid public url {raw:?}: {e}"))
    }

    pub fn validates_signature(&self) -> bool {
        self.validate_signature.as_deref().is_some_and(|v| !v.is_empty())
    }

    pub fn server_options(&self) -> anyhow::Result<ServerOptions> {
        Ok(ServerOptions {
            environment: self.environment.clone(),
            validate_signature: self.validates_signature(),
            signing_secret: self.signing_secret.clone(),
            public_url: self.public_url()?,
        })
    }
}
