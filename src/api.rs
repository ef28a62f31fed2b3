//! KATCP access to the registers of the design running on the board

use adc16ctl::Transport;
use katcp::{messages::core::*, prelude::*};
use katcp_casper::*;
use std::fmt::Debug;
use tokio::{io::AsyncWriteExt, net::tcp::OwnedWriteHalf, sync::mpsc::UnboundedReceiver};
use tracing::{debug, trace};

#[derive(Debug, thiserror::Error)]
pub enum KatcpTransportError {
    #[error("error talking to the board: {0}")]
    Io(#[from] std::io::Error),

    #[error("couldn't serialize request: {0}")]
    Serialize(String),

    #[error("the channel we were expecting messages from has been closed")]
    Closed,

    #[error("`{request}` failed with {ret_code}")]
    Failed { request: String, ret_code: String },

    #[error("`{0}` got a reply we couldn't make sense of")]
    BadReply(String),
}

pub struct State {
    pub unhandled_incoming_messages: UnboundedReceiver<Message>,
    // The writer
    pub writer: OwnedWriteHalf,
}

pub async fn make_request<T>(state: &mut State, request: T) -> Result<Vec<T>, KatcpTransportError>
where
    T: KatcpMessage + Debug,
    <T as TryFrom<Message>>::Error: Debug,
{
    // Serialize and send request
    let request_msg = request
        .to_message(None)
        .map_err(|e| KatcpTransportError::Serialize(format!("{e:?}")))?;
    let request_name = request_msg.name();
    trace!(?request, "Sending a request");
    state
        .writer
        .write_all(request_msg.to_string().as_bytes())
        .await?;
    let mut messages = vec![];
    loop {
        let v = state
            .unhandled_incoming_messages
            .recv()
            .await
            .ok_or(KatcpTransportError::Closed)?;
        match v.kind() {
            MessageKind::Request => debug!(name = %v.name(), "Ignoring a request from the board"),
            MessageKind::Inform => match v.try_into() {
                Ok(msg) => messages.push(msg),
                Err(e) => debug!(?e, "Unexpected message"),
            },
            MessageKind::Reply => {
                let msg = v
                    .try_into()
                    .map_err(|_| KatcpTransportError::BadReply(request_name.clone()))?;
                messages.push(msg);
                break;
            }
        }
    }
    Ok(messages)
}

fn check(request: &str, ret_code: &RetCode) -> Result<(), KatcpTransportError> {
    if *ret_code == RetCode::Ok {
        Ok(())
    } else {
        Err(KatcpTransportError::Failed {
            request: request.to_owned(),
            ret_code: format!("{ret_code:?}"),
        })
    }
}

pub async fn ping(state: &mut State) -> Result<(), KatcpTransportError> {
    match make_request(state, Watchdog::Request).await?.last() {
        Some(Watchdog::Reply(GenericReply::Ok)) => {
            debug!("Got a successful ping!");
            Ok(())
        }
        _ => Err(KatcpTransportError::BadReply("watchdog".to_owned())),
    }
}

/// Whether the FPGA is programmed and mapped
pub async fn fpga_programmed(state: &mut State) -> Result<bool, KatcpTransportError> {
    match make_request(state, Fpgastatus::Request).await?.last() {
        Some(Fpgastatus::Reply { ret_code }) => Ok(*ret_code == RetCode::Ok),
        _ => Err(KatcpTransportError::BadReply("fpgastatus".to_owned())),
    }
}

/// Names of the registers in the running design
pub async fn listdev(state: &mut State) -> Result<Vec<String>, KatcpTransportError> {
    let replies = make_request(state, Listdev::Request).await?;
    if let Some(Listdev::Reply { ret_code }) = replies.last() {
        check("listdev", ret_code)?;
    }
    Ok(replies
        .into_iter()
        .filter_map(|msg| match msg {
            Listdev::Inform { register } => Some(register),
            _ => None,
        })
        .collect())
}

pub async fn wordread(state: &mut State, name: &str, offset: u32) -> Result<u32, KatcpTransportError> {
    let replies = make_request(
        state,
        Wordread::Request {
            name: name.to_owned(),
            offset,
        },
    )
    .await?;
    match replies.last() {
        Some(Wordread::Reply { ret_code, word }) => {
            check("wordread", ret_code)?;
            Ok(word.0)
        }
        _ => Err(KatcpTransportError::BadReply("wordread".to_owned())),
    }
}

pub async fn wordwrite(
    state: &mut State,
    name: &str,
    offset: u32,
    word: u32,
) -> Result<(), KatcpTransportError> {
    let replies = make_request(
        state,
        Wordwrite::Request {
            name: name.to_owned(),
            offset,
            word: HexWord(word),
        },
    )
    .await?;
    match replies.last() {
        Some(Wordwrite::Reply { ret_code }) => check("wordwrite", ret_code),
        _ => Err(KatcpTransportError::BadReply("wordwrite".to_owned())),
    }
}

/// Reads `num_bytes` bytes of `name` starting `offset` bytes in, in a single request
pub async fn read(
    state: &mut State,
    name: &str,
    offset: u32,
    num_bytes: u32,
) -> Result<Vec<u8>, KatcpTransportError> {
    let replies = make_request(
        state,
        Read::Request {
            name: name.to_owned(),
            offset,
            num_bytes,
        },
    )
    .await?;
    match replies.into_iter().last() {
        Some(Read::Reply { ret_code, bytes }) => {
            check("read", &ret_code)?;
            Ok(bytes.0)
        }
        _ => Err(KatcpTransportError::BadReply("read".to_owned())),
    }
}

/// CASPER registers are big endian
fn be_words(bytes: &[u8], len: u32) -> Result<Vec<u32>, KatcpTransportError> {
    if bytes.len() != 4 * len as usize {
        return Err(KatcpTransportError::BadReply(format!(
            "read of {len} words returning {} bytes",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|c| u32::from_be_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

impl Transport for State {
    type Error = KatcpTransportError;

    async fn read(&mut self, name: &str, index: u32) -> Result<u32, Self::Error> {
        wordread(self, name, index).await
    }

    async fn write(&mut self, name: &str, index: u32, word: u32) -> Result<(), Self::Error> {
        wordwrite(self, name, index, word).await
    }

    async fn read_block(
        &mut self,
        name: &str,
        offset: u32,
        len: u32,
    ) -> Result<Vec<u32>, Self::Error> {
        let bytes = read(self, name, 4 * offset, 4 * len).await?;
        be_words(&bytes, len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_be_words() {
        let bytes = [0x2a, 0x2a, 0x2a, 0x2a, 0x70, 0x00, 0x80, 0xff];
        assert_eq!(
            be_words(&bytes, 2).unwrap(),
            vec![0x2a2a_2a2a, 0x7000_80ff]
        );
        assert!(be_words(&[], 0).unwrap().is_empty());
    }

    #[test]
    fn test_be_words_short_reply() {
        let res = be_words(&[0x2a; 6], 2);
        assert!(matches!(res, Err(KatcpTransportError::BadReply(_))));
        assert!(be_words(&[0x2a; 8], 1).is_err());
    }
}
