//! Status helper enum mapping to the `generation_statuses` lookup table.
//!
//! Variant discriminants match the seed data order (1-based) in the
//! migration. No magic numbers in queries — always go through the enum.

/// Status ID type matching SMALLINT/SMALLSERIAL in the database.
pub type StatusId = i16;

/// Generation lifecycle status.
///
/// `Processing` is the only non-terminal state: a generation is created in
/// it and leaves it exactly once, via a conditional update.
#[repr(i16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationStatus {
    Processing = 1,
    Completed = 2,
    Failed = 3,
    Cancelled = 4,
    Dismissed = 5,
}

/// Terminal statuses: no further automatic processing once reached.
pub const TERMINAL_STATUSES: [StatusId; 4] = [
    GenerationStatus::Completed as StatusId,
    GenerationStatus::Failed as StatusId,
    GenerationStatus::Cancelled as StatusId,
    GenerationStatus::Dismissed as StatusId,
];

impl GenerationStatus {
    /// Return the database status ID.
    pub fn id(self) -> StatusId {
        self as StatusId
    }

    /// Client-facing status string.
    pub fn as_str(self) -> &'static str {
        match self {
            GenerationStatus::Processing => "processing",
            GenerationStatus::Completed => "completed",
            GenerationStatus::Failed => "failed",
            GenerationStatus::Cancelled => "cancelled",
            GenerationStatus::Dismissed => "dismissed",
        }
    }

    /// Map a raw status id back to the enum, if it is a known value.
    pub fn from_id(id: StatusId) -> Option<Self> {
        match id {
            1 => Some(GenerationStatus::Processing),
            2 => Some(GenerationStatus::Completed),
            3 => Some(GenerationStatus::Failed),
            4 => Some(GenerationStatus::Cancelled),
            5 => Some(GenerationStatus::Dismissed),
            _ => None,
        }
    }
}

impl From<GenerationStatus> for StatusId {
    fn from(value: GenerationStatus) -> Self {
        value as StatusId
    }
}

/// Whether a raw status id is terminal.
pub fn is_terminal(id: StatusId) -> bool {
    TERMINAL_STATUSES.contains(&id)
}
