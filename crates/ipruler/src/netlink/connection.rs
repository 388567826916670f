//! Request/response handling over a single rtnetlink socket.

use super::builder::MessageBuilder;
use super::error::{Error, Result};
use super::message::{
    MessageIter, NLM_F_ACK, NLM_F_CREATE, NLM_F_DUMP, NLM_F_EXCL, NLM_F_REQUEST, NlMsgError,
    NlMsgType,
};
use super::messages::{AddressMessage, LinkMessage, RouteMessage, RuleMessage};
use super::parse::FromNetlink;
use super::socket::NetlinkSocket;

/// High-level rtnetlink connection.
///
/// Requests are strictly sequential: every call sends one message and
/// reads until the matching ACK or `NLMSG_DONE`.
pub struct Connection {
    socket: NetlinkSocket,
}

impl Connection {
    /// Open a new NETLINK_ROUTE connection.
    pub fn new() -> Result<Self> {
        Ok(Self {
            socket: NetlinkSocket::new()?,
        })
    }

    /// Get the underlying socket.
    pub fn socket(&self) -> &NetlinkSocket {
        &self.socket
    }

    /// Stamp `builder` with a fresh sequence number and our port id, send
    /// it, and return the sequence number replies will carry.
    async fn send(&self, mut builder: MessageBuilder) -> Result<u32> {
        let seq = self.socket.next_seq();
        builder.set_seq(seq);
        builder.set_pid(self.socket.pid());
        self.socket.send(&builder.finish()).await?;
        Ok(seq)
    }

    /// Send a request that expects an ACK only (no data response).
    pub async fn request_ack(&self, builder: MessageBuilder) -> Result<()> {
        let seq = self.send(builder).await?;

        loop {
            let datagram = self.socket.recv_msg().await?;
            for reply in replies(&datagram, seq) {
                if let Reply::Ack = reply? {
                    return Ok(());
                }
            }
        }
    }

    /// Send a dump request and collect the payload of every reply.
    pub async fn dump(&self, builder: MessageBuilder) -> Result<Vec<Vec<u8>>> {
        let seq = self.send(builder).await?;
        let mut payloads = Vec::new();

        loop {
            let datagram = self.socket.recv_msg().await?;
            for reply in replies(&datagram, seq) {
                match reply? {
                    Reply::Done => return Ok(payloads),
                    Reply::Data(payload) => payloads.push(payload.to_vec()),
                    Reply::Ack => {}
                }
            }
        }
    }

    /// Send a dump request and parse all responses into typed messages.
    ///
    /// Replies that fail to parse are skipped; a dump never fails because
    /// the kernel reported an object with attributes we do not understand.
    pub async fn dump_typed<T: FromNetlink>(&self, msg_type: u16) -> Result<Vec<T>> {
        let mut builder = dump_request(msg_type);

        let mut header_buf = Vec::new();
        T::write_dump_header(&mut header_buf);
        builder.append_bytes(&header_buf);

        let responses = self.dump(builder).await?;

        Ok(responses
            .iter()
            .filter_map(|payload| T::from_bytes(payload).ok())
            .collect())
    }

    /// Get all network interfaces.
    pub async fn get_links(&self) -> Result<Vec<LinkMessage>> {
        self.dump_typed(NlMsgType::RTM_GETLINK).await
    }

    /// Get all IP addresses.
    pub async fn get_addresses(&self) -> Result<Vec<AddressMessage>> {
        self.dump_typed(NlMsgType::RTM_GETADDR).await
    }

    /// Get all routes of every family and table.
    pub async fn get_routes(&self) -> Result<Vec<RouteMessage>> {
        self.dump_typed(NlMsgType::RTM_GETROUTE).await
    }

    /// Get routes for a specific table.
    pub async fn get_routes_for_table(&self, table_id: u32) -> Result<Vec<RouteMessage>> {
        let routes = self.get_routes().await?;
        Ok(routes
            .into_iter()
            .filter(|r| r.table_id() == table_id)
            .collect())
    }

    /// Get all policy routing rules.
    pub async fn get_rules(&self) -> Result<Vec<RuleMessage>> {
        self.dump_typed(NlMsgType::RTM_GETRULE).await
    }
}

/// One reply addressed to the request in flight.
enum Reply<'a> {
    Ack,
    Done,
    Data(&'a [u8]),
}

/// Replies in `datagram` carrying `seq`. Stale replies from an earlier,
/// abandoned request are skipped; a kernel error ends the iteration.
fn replies(datagram: &[u8], seq: u32) -> impl Iterator<Item = Result<Reply<'_>>> {
    MessageIter::new(datagram).filter_map(move |msg| {
        let (header, payload) = match msg {
            Ok(msg) => msg,
            Err(e) => return Some(Err(e)),
        };
        if header.nlmsg_seq != seq {
            return None;
        }
        if header.is_done() {
            return Some(Ok(Reply::Done));
        }
        if !header.is_error() {
            return Some(Ok(Reply::Data(payload)));
        }
        Some(NlMsgError::from_bytes(payload).and_then(|err| {
            if err.is_ack() {
                Ok(Reply::Ack)
            } else {
                Err(Error::from_errno(err.error))
            }
        }))
    })
}

/// Helper to build a dump request.
pub fn dump_request(msg_type: u16) -> MessageBuilder {
    MessageBuilder::new(msg_type, NLM_F_REQUEST | NLM_F_DUMP)
}

/// Helper to build a request expecting ACK.
pub fn ack_request(msg_type: u16) -> MessageBuilder {
    MessageBuilder::new(msg_type, NLM_F_REQUEST | NLM_F_ACK)
}

/// Helper to build an exclusive create request; fails with EEXIST on duplicates.
pub fn create_request(msg_type: u16) -> MessageBuilder {
    MessageBuilder::new(
        msg_type,
        NLM_F_REQUEST | NLM_F_ACK | NLM_F_CREATE | NLM_F_EXCL,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::netlink::message::{NLM_F_MULTI, NlMsgHdr, nlmsg_align};

    fn frame(msg_type: u16, seq: u32, payload: &[u8]) -> Vec<u8> {
        let mut hdr = NlMsgHdr::new(msg_type, NLM_F_MULTI);
        hdr.nlmsg_len = (crate::netlink::NLMSG_HDRLEN + payload.len()) as u32;
        hdr.nlmsg_seq = seq;
        let mut buf = hdr.as_bytes().to_vec();
        buf.extend_from_slice(payload);
        buf.resize(nlmsg_align(buf.len()), 0);
        buf
    }

    fn error_payload(errno: i32) -> Vec<u8> {
        let mut payload = errno.to_ne_bytes().to_vec();
        payload.extend_from_slice(NlMsgHdr::new(NlMsgType::RTM_NEWRULE, 0).as_bytes());
        payload
    }

    #[test]
    fn test_replies_skip_stale_sequence() {
        let mut datagram = frame(NlMsgType::RTM_NEWRULE, 3, &[9, 9, 9, 9]);
        datagram.extend(frame(NlMsgType::RTM_NEWRULE, 4, &[1, 2, 3, 4]));
        datagram.extend(frame(NlMsgType::DONE, 4, &[0; 4]));

        let got: Vec<_> = replies(&datagram, 4).collect::<Result<_>>().unwrap();
        assert_eq!(got.len(), 2);
        assert!(matches!(got[0], Reply::Data(&[1, 2, 3, 4])));
        assert!(matches!(got[1], Reply::Done));
    }

    #[test]
    fn test_replies_ack_and_error() {
        let ack = frame(NlMsgType::ERROR, 7, &error_payload(0));
        assert!(matches!(replies(&ack, 7).next(), Some(Ok(Reply::Ack))));

        let nack = frame(NlMsgType::ERROR, 7, &error_payload(-libc::EEXIST));
        let err = replies(&nack, 7).next().unwrap().err().unwrap();
        assert!(err.is_already_exists());
    }

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn connection_is_send_sync() {
        assert_send::<Connection>();
        assert_sync::<Connection>();
    }

    #[test]
    fn test_request_flags() {
        let msg = create_request(NlMsgType::RTM_NEWRULE).finish();
        let header = NlMsgHdr::from_bytes(&msg).unwrap();
        assert_eq!(
            header.nlmsg_flags,
            NLM_F_REQUEST | NLM_F_ACK | NLM_F_CREATE | NLM_F_EXCL
        );

        let msg = dump_request(NlMsgType::RTM_GETLINK).finish();
        let header = NlMsgHdr::from_bytes(&msg).unwrap();
        assert_eq!(header.nlmsg_flags & NLM_F_DUMP, NLM_F_DUMP);
    }
}
