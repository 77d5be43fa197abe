//! Interactive Front-End
//!
//! A prompt that reads request lines and prints responses, against either
//! a remote server or an in-process command handler.
//!
//! ```text
//! linekv client
//! > set name Ariz
//! > ok
//! > get name
//! > Ariz
//! > exit
//! bye
//! ```

use crate::client::{ClientError, TcpClient};
use crate::commands::CommandHandler;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

/// What the prompt sends requests to.
#[derive(Debug)]
pub enum Backend {
    Remote(TcpClient),
    Embedded(CommandHandler),
}

impl Backend {
    /// Runs one request and returns the response text.
    pub async fn execute(&mut self, request: &str) -> Result<String, ClientError> {
        match self {
            Backend::Remote(client) => {
                let response = client.send(request.as_bytes()).await?;
                Ok(String::from_utf8_lossy(&response).into_owned())
            }
            Backend::Embedded(handler) => Ok(handler.run(request)),
        }
    }

    fn banner(&self) -> &'static str {
        match self {
            Backend::Remote(_) => "linekv client",
            Backend::Embedded(_) => "linekv embedded",
        }
    }
}

/// Runs the prompt until `exit` or end of input.
///
/// Responses and send failures alike are printed and the prompt
/// continues. Only I/O errors on the prompt's own streams end the session.
pub async fn run<R, W>(input: R, mut output: W, mut backend: Backend) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    output
        .write_all(format!("{}\n", backend.banner()).as_bytes())
        .await?;

    let mut lines = input.lines();
    loop {
        output.write_all(b"> ").await?;
        output.flush().await?;

        let request = match lines.next_line().await? {
            Some(line) => line,
            None => break,
        };
        let request = request.trim();

        if request.is_empty() {
            continue;
        }
        if request.eq_ignore_ascii_case("exit") {
            break;
        }

        let response = match backend.execute(request).await {
            Ok(response) => response,
            Err(e) => format!("failed send: {}", e),
        };
        output
            .write_all(format!("> {}\n", response).as_bytes())
            .await?;
    }

    output.write_all(b"bye\n").await?;
    output.flush().await?;
    Ok(())
}
