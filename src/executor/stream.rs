use tokio::sync::mpsc;

pub const DONE_MESSAGE: &str = "Command completed successfully";

/// Line tags of the streamed output protocol.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tag {
    Stdout,
    Stderr,
    Info,
    Warn,
    Error,
    Done,
}

impl Tag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stdout => "[STDOUT]",
            Self::Stderr => "[STDERR]",
            Self::Info => "[INFO]",
            Self::Warn => "[WARN]",
            Self::Error => "[ERROR]",
            Self::Done => "[DONE]",
        }
    }
}

/// Writer side of a tagged line stream. Every line is sent as its own
/// chunk so the consumer can flush per line; a closed receiver means the
/// client went away, and further output is silently discarded while the
/// work runs to completion.
#[derive(Clone)]
pub struct OutputStream {
    tx: mpsc::Sender<String>,
}

impl OutputStream {
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self { tx }, rx)
    }

    pub async fn line(&self, tag: Tag, text: &str) {
        let _ = self.tx.send(format!("{} {}\n", tag.as_str(), text)).await;
    }

    pub async fn info(&self, text: &str) {
        self.line(Tag::Info, text).await;
    }

    pub async fn warn(&self, text: &str) {
        self.line(Tag::Warn, text).await;
    }

    pub async fn error(&self, text: &str) {
        self.line(Tag::Error, text).await;
    }

    pub async fn done(&self) {
        self.line(Tag::Done, DONE_MESSAGE).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lines_are_tagged_and_newline_terminated() {
        let (out, mut rx) = OutputStream::channel(8);
        out.line(Tag::Stdout, "hello").await;
        out.info("creating network").await;
        out.done().await;
        drop(out);

        assert_eq!(rx.recv().await.unwrap(), "[STDOUT] hello\n");
        assert_eq!(rx.recv().await.unwrap(), "[INFO] creating network\n");
        assert_eq!(
            rx.recv().await.unwrap(),
            "[DONE] Command completed successfully\n"
        );
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn a_gone_receiver_does_not_fail_the_writer() {
        let (out, rx) = OutputStream::channel(1);
        drop(rx);
        out.info("nobody listens").await;
    }
}
