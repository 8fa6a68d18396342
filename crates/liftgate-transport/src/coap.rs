//! CoAP PDU construction and classification.
//!
//! Requests are confirmable POSTs with an `application/json` content
//! format. The dispatcher usually piggybacks its response on the ACK; a
//! separate CON response is also legal and must be acknowledged with an
//! empty ACK, which [`classify`] surfaces via `needs_ack`.

use coap_lite::{CoapOption, MessageClass, MessageType, Packet, RequestType};

use crate::{TransportError, UplinkReply};

/// CoAP content format number for `application/json`.
const APPLICATION_JSON: u8 = 50;

/// A classified inbound PDU.
#[derive(Debug, PartialEq, Eq)]
pub enum Inbound {
    /// A response carrying a token and body.
    Reply {
        reply: UplinkReply,
        /// Message id to acknowledge when the response arrived as CON.
        needs_ack: Option<u16>,
    },
    /// An empty ACK; the matching response will arrive separately.
    EmptyAck { message_id: u16 },
    /// A reset; the peer rejected our message.
    Reset { message_id: u16 },
}

/// Build a confirmable POST to a dispatcher resource.
///
/// # Errors
///
/// Returns [`TransportError::Coap`] if the PDU cannot be encoded.
pub fn build_request(
    path: &str,
    token: &[u8],
    payload: &[u8],
    message_id: u16,
) -> Result<Vec<u8>, TransportError> {
    let mut packet = Packet::new();
    packet.header.set_type(MessageType::Confirmable);
    packet.header.code = MessageClass::Request(RequestType::Post);
    packet.header.message_id = message_id;
    packet.set_token(token.to_vec());
    packet.add_option(CoapOption::UriPath, path.as_bytes().to_vec());
    packet.add_option(CoapOption::ContentFormat, vec![APPLICATION_JSON]);
    packet.payload = payload.to_vec();
    packet
        .to_bytes()
        .map_err(|e| TransportError::Coap(format!("request encode failed: {e:?}")))
}

/// Build an empty ACK for a CON response.
///
/// # Errors
///
/// Returns [`TransportError::Coap`] if the PDU cannot be encoded.
pub fn build_empty_ack(message_id: u16) -> Result<Vec<u8>, TransportError> {
    let mut packet = Packet::new();
    packet.header.set_type(MessageType::Acknowledgement);
    packet.header.code = MessageClass::Empty;
    packet.header.message_id = message_id;
    packet
        .to_bytes()
        .map_err(|e| TransportError::Coap(format!("ack encode failed: {e:?}")))
}

/// Classify a datagram received from the dispatcher.
///
/// # Errors
///
/// Returns [`TransportError::Coap`] for undecodable datagrams or message
/// shapes the gateway never expects (inbound requests).
pub fn classify(datagram: &[u8]) -> Result<Inbound, TransportError> {
    let packet = Packet::from_bytes(datagram)
        .map_err(|e| TransportError::Coap(format!("PDU decode failed: {e:?}")))?;

    let message_id = packet.header.message_id;
    match packet.header.get_type() {
        MessageType::Reset => return Ok(Inbound::Reset { message_id }),
        MessageType::Acknowledgement if packet.header.code == MessageClass::Empty => {
            return Ok(Inbound::EmptyAck { message_id });
        }
        _ => {}
    }

    match packet.header.code {
        MessageClass::Response(_) => {
            let code = u8::from(packet.header.code);
            let needs_ack = match packet.header.get_type() {
                MessageType::Confirmable => Some(message_id),
                _ => None,
            };
            Ok(Inbound::Reply {
                reply: UplinkReply {
                    token: packet.get_token().to_vec(),
                    code_class: code >> 5,
                    code_detail: code & 0x1F,
                    payload: packet.payload.clone(),
                },
                needs_ack,
            })
        }
        other => Err(TransportError::Coap(format!(
            "unexpected inbound message class {other:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coap_lite::ResponseType;

    #[test]
    fn test_build_request_roundtrip() {
        let bytes =
            build_request("peticion_piso", &[0xAA, 0xBB, 0xCC, 0xDD], b"{}", 7).expect("encode");
        let packet = Packet::from_bytes(&bytes).expect("decode");
        assert_eq!(packet.header.get_type(), MessageType::Confirmable);
        assert_eq!(packet.header.code, MessageClass::Request(RequestType::Post));
        assert_eq!(packet.header.message_id, 7);
        assert_eq!(packet.get_token(), &[0xAA, 0xBB, 0xCC, 0xDD]);
        assert_eq!(packet.payload, b"{}");
        let path: Vec<u8> = packet
            .get_option(CoapOption::UriPath)
            .and_then(|opts| opts.front().cloned())
            .expect("uri path");
        assert_eq!(path, b"peticion_piso");
    }

    #[test]
    fn test_classify_piggybacked_reply() {
        let mut packet = Packet::new();
        packet.header.set_type(MessageType::Acknowledgement);
        packet.header.code = MessageClass::Response(ResponseType::Created);
        packet.header.message_id = 7;
        packet.set_token(vec![1, 2, 3, 4]);
        packet.payload = b"{\"tarea_id\":\"T_1\"}".to_vec();
        let bytes = packet.to_bytes().expect("encode");

        match classify(&bytes).expect("classify") {
            Inbound::Reply { reply, needs_ack } => {
                assert!(needs_ack.is_none());
                assert!(reply.is_success());
                assert_eq!(reply.code(), "2.01");
                assert_eq!(reply.token, vec![1, 2, 3, 4]);
            }
            other => unreachable!("expected reply, got {other:?}"),
        }
    }

    #[test]
    fn test_classify_con_reply_needs_ack() {
        let mut packet = Packet::new();
        packet.header.set_type(MessageType::Confirmable);
        packet.header.code = MessageClass::Response(ResponseType::BadRequest);
        packet.header.message_id = 99;
        packet.set_token(vec![5, 6, 7, 8]);
        let bytes = packet.to_bytes().expect("encode");

        match classify(&bytes).expect("classify") {
            Inbound::Reply { reply, needs_ack } => {
                assert_eq!(needs_ack, Some(99));
                assert!(!reply.is_success());
                assert_eq!(reply.code(), "4.00");
            }
            other => unreachable!("expected reply, got {other:?}"),
        }
    }

    #[test]
    fn test_classify_empty_ack() {
        let bytes = build_empty_ack(31).expect("encode");
        assert_eq!(
            classify(&bytes).expect("classify"),
            Inbound::EmptyAck { message_id: 31 }
        );
    }

    #[test]
    fn test_classify_garbage() {
        assert!(classify(&[0xFF]).is_err());
    }

    #[test]
    fn test_classify_rejects_inbound_request() {
        let mut packet = Packet::new();
        packet.header.set_type(MessageType::Confirmable);
        packet.header.code = MessageClass::Request(RequestType::Get);
        let bytes = packet.to_bytes().expect("encode");
        assert!(classify(&bytes).is_err());
    }
}
