//! Diesel schema for chat message persistence.

diesel::table! {
    /// Chat messages with soft-delete support.
    chat_messages (id) {
        /// Message identifier (microsecond timestamp).
        id -> Int8,
        /// When the message entered the server.
        created_at -> Timestamptz,
        /// Sending participant.
        #[max_length = 255]
        sender -> Varchar,
        /// Destination address in its rendered form.
        #[max_length = 255]
        recipient -> Varchar,
        /// Normalised message text.
        content -> Text,
        /// Soft-delete timestamp.
        deleted_at -> Nullable<Timestamptz>,
    }
}
