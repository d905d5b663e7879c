/// Telegram chat id, used as the conversation key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChatId(pub i64);

/// One gateway credential plus its position in the pool.
///
/// Immutable once loaded; the pool is never mutated at runtime.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiKey {
    pub secret: String,
    pub index: usize,
}

/// Who authored a turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

/// Descriptor for a photo attached to a turn.
///
/// We keep the Telegram file id and caption as context, not the bytes;
/// vision upload is out of scope.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageNote {
    pub file_id: String,
    pub caption: Option<String>,
}

/// One message in a conversation's history.
///
/// `seq` is a per-conversation monotonic order index assigned at append
/// time; it survives window eviction and is used to retract a provisional
/// user turn after a failed model call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Turn {
    pub role: Role,
    pub text: String,
    pub image: Option<ImageNote>,
    pub seq: u64,
}
