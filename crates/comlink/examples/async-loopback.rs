//! Framed async I/O with `MessageCodec` over an in-memory duplex pipe.
//!
//! Run with:
//!   cargo run --example async-loopback --features async

use comlink::frame::{Message, MessageCodec};
use futures_util::{SinkExt, StreamExt};
use tokio_util::codec::Framed;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (host, target) = tokio::io::duplex(1024);
    let mut host = Framed::new(host, MessageCodec::new(0));
    let mut target = Framed::new(target, MessageCodec::new(1));

    let responder = tokio::spawn(async move {
        while let Some(msg) = target.next().await {
            let msg = msg?;
            eprintln!(
                "target got interface {} id {}: {} bytes",
                msg.interface(),
                msg.id(),
                msg.payload.len()
            );
            target.send(msg.reply(msg.id() + 1, msg.payload.clone())?).await?;
        }
        Ok::<(), comlink::frame::FrameError>(())
    });

    for i in 0..3u8 {
        host.send(Message::new(0, 3, i, vec![i; 4])?).await?;
        if let Some(reply) = host.next().await {
            let reply = reply?;
            println!("reply id {} payload {:?}", reply.id(), reply.payload.as_ref());
        }
    }

    drop(host);
    responder.await??;
    Ok(())
}
