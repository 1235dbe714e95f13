#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub text: String,
    pub meta: Vec<String>,
}

pub const HINTS: &[&str] = &[
    "Summarise outstanding punch items",
    "What does a failed loop check usually mean?",
    "Draft a client handover note",
];

/// Chat transcript for the assistant side panel. Replies stream in: a
/// pending assistant bubble accumulates chunks until the stream finishes.
#[derive(Debug, Clone, Default)]
pub struct AssistantState {
    pub open: bool,
    pub messages: Vec<ChatMessage>,
    pub input: String,
    pub busy: bool,
    pub bootstrapped: bool,
    pub scroll_y: u16,
    pending: Option<usize>,
}

impl AssistantState {
    /// First open seeds the transcript with a greeting.
    pub fn bootstrap(&mut self) {
        if self.bootstrapped {
            return;
        }
        self.bootstrapped = true;
        self.messages.push(ChatMessage {
            role: ChatRole::Assistant,
            text: "Hello — ask me about this SAT report, or `:attach` a document for research."
                .into(),
            meta: Vec::new(),
        });
    }

    pub fn push_user(&mut self, text: impl Into<String>) {
        self.messages.push(ChatMessage {
            role: ChatRole::User,
            text: text.into(),
            meta: Vec::new(),
        });
    }

    pub fn begin_reply(&mut self) {
        self.busy = true;
        self.messages.push(ChatMessage {
            role: ChatRole::Assistant,
            text: String::new(),
            meta: Vec::new(),
        });
        self.pending = Some(self.messages.len() - 1);
    }

    pub fn stream_chunk(&mut self, chunk: &str) {
        if let Some(idx) = self.pending {
            if let Some(msg) = self.messages.get_mut(idx) {
                msg.text.push_str(chunk);
            }
        }
    }

    /// Final text replaces whatever streamed in; `meta` lines ride along
    /// (source citations, truncation notes).
    pub fn finish_reply(&mut self, text: Option<String>, meta: Vec<String>) {
        if let Some(idx) = self.pending.take() {
            if let Some(msg) = self.messages.get_mut(idx) {
                if let Some(t) = text {
                    msg.text = t;
                }
                if msg.text.is_empty() {
                    msg.text = "(no reply)".into();
                }
                msg.meta = meta;
            }
        }
        self.busy = false;
    }

    pub fn fail_reply(&mut self, err: &str) {
        if let Some(idx) = self.pending.take() {
            if let Some(msg) = self.messages.get_mut(idx) {
                msg.text = format!("The assistant is unavailable: {err}");
            }
        }
        self.busy = false;
    }
}
