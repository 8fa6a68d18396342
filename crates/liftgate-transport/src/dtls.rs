//! DTLS-PSK client handshake.
//!
//! The gateway is always the DTLS client. Authentication is mutual through
//! the pre-shared key itself (cipher suite TLS_PSK_WITH_AES_128_CCM_8, the
//! CoAP-over-DTLS profile); no certificates are involved.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::UdpSocket;
use webrtc_dtls::cipher_suite::CipherSuiteId;
use webrtc_dtls::config::{Config, ExtendedMasterSecretType};
use webrtc_dtls::conn::DTLSConn;
use webrtc_util::conn::Conn;

use crate::TransportError;

/// Bind the local UDP socket, connect it to the dispatcher, and run the
/// PSK handshake.
///
/// # Errors
///
/// Returns [`TransportError::Io`] for socket failures and
/// [`TransportError::Handshake`] when the DTLS handshake is rejected.
pub(crate) async fn connect(
    gateway_listen: SocketAddr,
    dispatcher_endpoint: SocketAddr,
    psk: Vec<u8>,
    psk_identity: Vec<u8>,
) -> Result<DTLSConn, TransportError> {
    let socket = UdpSocket::bind(gateway_listen)
        .await
        .map_err(|e| TransportError::Io(format!("bind {gateway_listen} failed: {e}")))?;
    socket
        .connect(dispatcher_endpoint)
        .await
        .map_err(|e| TransportError::Io(format!("connect {dispatcher_endpoint} failed: {e}")))?;

    let config = Config {
        psk: Some(Arc::new(move |_hint: &[u8]| Ok(psk.clone()))),
        psk_identity_hint: Some(psk_identity),
        cipher_suites: vec![CipherSuiteId::Tls_Psk_With_Aes_128_Ccm_8],
        extended_master_secret: ExtendedMasterSecretType::Require,
        ..Default::default()
    };

    let conn: Arc<dyn Conn + Send + Sync> = Arc::new(socket);
    let dtls = DTLSConn::new(conn, config, true, None)
        .await
        .map_err(|e| TransportError::Handshake(e.to_string()))?;

    tracing::debug!(%dispatcher_endpoint, "DTLS-PSK session established");
    Ok(dtls)
}
