//! Mirror of `google.rpc.Status`, used by clients to NACK a response.

/// Error detail attached to a rejected response.
#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Status {
    /// Status code, using gRPC code numbering.
    #[prost(int32, tag = "1")]
    pub code: i32,
    /// Developer-facing error message.
    #[prost(string, tag = "2")]
    pub message: ::prost::alloc::string::String,
    /// Additional error details.
    #[prost(message, repeated, tag = "3")]
    pub details: ::prost::alloc::vec::Vec<::prost_types::Any>,
}
