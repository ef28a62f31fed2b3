//! Asynchronous informs from tcpborphserver, turned into log lines

use std::{collections::HashMap, fmt::Debug};

use adc16ctl::CONTROLLER;
use katcp::{
    messages::{core::*, log::*},
    prelude::*,
};
use katcp_casper::*;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    net::tcp::OwnedReadHalf,
    sync::mpsc::UnboundedSender,
};
use tracing::{debug, error, info, trace, warn};

pub(crate) type MessageName = String;
pub(crate) type DispatchFn = Box<dyn FnMut(Message) + Send>;
pub(crate) type Dispatchers = HashMap<MessageName, DispatchFn>;

/// Wraps a typed inform handler so it can be dispatched on raw messages
fn typed<T>(name: &'static str, handle: fn(T)) -> (MessageName, DispatchFn)
where
    T: TryFrom<Message> + 'static,
    <T as TryFrom<Message>>::Error: Debug,
{
    let dispatch = move |msg: Message| match msg.try_into() {
        Ok(inform) => handle(inform),
        Err(e) => error!(?e, "Couldn't deserialize `{name}`"),
    };
    (name.to_owned(), Box::new(dispatch))
}

fn board_log(log: Log) {
    let Log::Inform {
        level,
        name,
        message,
        ..
    } = log;
    match level {
        Level::Error => error!(board = %name, %message),
        Level::Warn => warn!(board = %name, %message),
        Level::Info => info!(board = %name, %message),
        Level::Debug => debug!(board = %name, %message),
        Level::Trace => trace!(board = %name, %message),
        _ => info!(level = %level.to_argument(), board = %name, %message),
    }
}

fn fpga_state(fpga: Fpga) {
    let Fpga::Inform { status } = fpga;
    match status {
        FpgaStatus::Down => warn!("FPGA went down, `{CONTROLLER}` is gone until it's reprogrammed"),
        FpgaStatus::Loaded => info!("FPGA loaded"),
        FpgaStatus::Ready => info!("FPGA ready"),
        FpgaStatus::Mapped => debug!("FPGA mapped"),
    }
}

fn server_version(vc: VersionConnect) {
    debug!(?vc, "Server version");
}

pub(crate) fn make_inform_dispatchers() -> Dispatchers {
    [
        typed("log", board_log),
        typed("fpga", fpga_state),
        typed("version-connect", server_version),
    ]
    .into_iter()
    .collect()
}

/// Reads messages off the board connection. Informs we have a dispatcher for are handled here,
/// everything else goes to whoever is waiting on `sender`.
pub(crate) async fn handle_informs(
    sender: UnboundedSender<Message>,
    reader: OwnedReadHalf,
    mut dispatchers: Dispatchers,
) {
    let mut lines = BufReader::new(reader).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => {
                warn!("Board closed the connection");
                break;
            }
            Err(e) => {
                error!(%e, "Error reading from the board");
                break;
            }
        };
        if line.is_empty() {
            continue;
        }
        let msg: Message = match line.as_str().try_into() {
            Ok(msg) => msg,
            Err(e) => {
                error!(?e, %line, "Couldn't deserialize incoming KATCP message");
                continue;
            }
        };
        if msg.kind() == MessageKind::Inform {
            if let Some(dispatch_fn) = dispatchers.get_mut(&msg.name()) {
                dispatch_fn(msg);
                continue;
            }
        }
        // Dropping the sender closes the channel, which fails any request still waiting
        if sender.send(msg).is_err() {
            debug!("Nobody is listening for replies anymore");
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };
    use tokio::{
        io::AsyncWriteExt,
        net::{TcpListener, TcpStream},
        sync::mpsc::unbounded_channel,
    };

    #[test]
    fn test_dispatcher_names() {
        let dispatchers = make_inform_dispatchers();
        let mut names: Vec<_> = dispatchers.keys().cloned().collect();
        names.sort();
        assert_eq!(names, ["fpga", "log", "version-connect"]);
    }

    #[tokio::test]
    async fn test_informs_stay_off_the_reply_channel() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (client, server) = tokio::join!(TcpStream::connect(addr), listener.accept());
        let (reader, _writer) = client.unwrap().into_split();
        let (mut board, _) = server.unwrap();

        let seen = Arc::new(AtomicUsize::new(0));
        let mut dispatchers = make_inform_dispatchers();
        let counter = seen.clone();
        dispatchers.insert(
            "fpga".to_owned(),
            Box::new(move |_: Message| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );
        let (tx, mut rx) = unbounded_channel();
        let task = tokio::spawn(handle_informs(tx, reader, dispatchers));

        board
            .write_all(b"#fpga ready\n\n#listdev adc16_controller\n!wordwrite ok\n")
            .await
            .unwrap();
        drop(board);

        let first = rx.recv().await.unwrap();
        assert_eq!(first.kind(), MessageKind::Inform);
        assert_eq!(first.name(), "listdev");
        let second = rx.recv().await.unwrap();
        assert_eq!(second.kind(), MessageKind::Reply);
        assert_eq!(second.name(), "wordwrite");
        task.await.unwrap();
        // The reader hung up once the board closed, closing the channel
        assert!(rx.recv().await.is_none());
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }
}
