use std::io;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_rustls::rustls::{ClientConfig, RootCertStore, ServerName};
use tokio_rustls::{rustls, TlsConnector};

pub const HOST: &str = "irc.chat.twitch.tv";
pub const TLS_PORT: u16 = 6697;
pub const PLAIN_PORT: u16 = 6667;

/// Anything the client can talk IRC over.
pub trait Io: AsyncRead + AsyncWrite + Send + Sync + Unpin + 'static {}
impl<T> Io for T where T: AsyncRead + AsyncWrite + Send + Sync + Unpin + 'static {}

/// A type-erased transport, TLS or plain TCP, or an in-memory pipe in tests.
pub type Stream = Box<dyn Io>;

/// Open a connection to Twitch.
///
/// Uses TLS on port 6697 if `secure`, plain TCP on port 6667 otherwise.
pub async fn open(secure: bool) -> Result<Stream, OpenStreamError> {
  if secure {
    let config = TlsConfig::load(ServerName::try_from(HOST)?)?;
    trace!(?config, "opening tls stream to twitch");
    let stream = TlsConnector::from(config.client())
      .connect(
        config.server_name(),
        TcpStream::connect((HOST, TLS_PORT)).await?,
      )
      .await?;
    Ok(Box::new(stream))
  } else {
    trace!("opening plain tcp stream to twitch");
    let stream = TcpStream::connect((HOST, PLAIN_PORT)).await?;
    stream.set_nodelay(true)?;
    Ok(Box::new(stream))
  }
}

/// Failed to open a stream.
#[derive(Debug, thiserror::Error)]
pub enum OpenStreamError {
  /// The underlying I/O operation failed.
  #[error("failed to open stream: {0}")]
  Io(#[from] io::Error),

  #[error("failed to open stream: {0}")]
  Dns(#[from] rustls::client::InvalidDnsNameError),

  #[error("failed to open stream: {0}")]
  Tls(#[from] TlsConfigError),
}

#[derive(Debug, Clone)]
pub struct TlsConfig {
  config: Arc<ClientConfig>,
  server_name: ServerName,
}

impl TlsConfig {
  pub fn load(server_name: ServerName) -> Result<Self, TlsConfigError> {
    trace!("loading native certificates");
    let mut root_store = RootCertStore::empty();
    let native_certs = rustls_native_certs::load_native_certs()?;
    for cert in native_certs {
      root_store.add(&rustls::Certificate(cert.0))?;
    }
    let config = rustls::ClientConfig::builder()
      .with_safe_defaults()
      .with_root_certificates(root_store)
      .with_no_client_auth();
    Ok(Self {
      config: Arc::new(config),
      server_name,
    })
  }

  pub fn client(&self) -> Arc<ClientConfig> {
    self.config.clone()
  }

  pub fn server_name(&self) -> ServerName {
    self.server_name.clone()
  }
}

/// Failed to load the TLS config.
#[derive(Debug, thiserror::Error)]
pub enum TlsConfigError {
  /// The underlying I/O operation failed.
  #[error("tls config error: {0}")]
  Io(#[from] io::Error),
  /// Failed to load certificates.
  #[error("tls config error: {0}")]
  Tls(#[from] rustls::Error),
}
