use bytes::{Bytes, BytesMut};
use esbtx_frame::{encode_message, type_name, Message};
use esbtx_transport::{SerialLink, Transport, DEFAULT_TIMEOUT};

use crate::cmd::SendArgs;
use crate::exit::{frame_error, transport_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_sent, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let msg = resolve_message(&args)?;
    let frame =
        encode_message(&msg).map_err(|err| frame_error("frame encoding failed", err))?;

    let mut link = SerialLink::open(&args.port, args.baud, DEFAULT_TIMEOUT)
        .map_err(|err| transport_error("open failed", err))?;

    let mut buf = BytesMut::with_capacity(frame.wire_size());
    frame.encode_into(&mut buf);
    link.write_all(&buf)
        .map_err(|err| transport_error("write failed", err))?;

    print_sent(&args.port, type_name(frame.frame_type()), buf.len(), format);
    Ok(SUCCESS)
}

fn resolve_message(args: &SendArgs) -> CliResult<Message> {
    if let Some(sync) = args.sync {
        return Ok(Message::Sync { kind: sync.kind() });
    }
    if let Some(data) = &args.data {
        return Ok(Message::Data {
            seq: args.seq,
            payload: Bytes::from(data.clone().into_bytes()),
        });
    }
    if let Some(map) = &args.map {
        return Ok(Message::ChannelMap {
            channels: map.clone(),
        });
    }
    Err(CliError::new(
        USAGE,
        "one of --sync, --data, --map is required",
    ))
}
