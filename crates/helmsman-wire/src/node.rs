//! Mirror of the client identity record (`envoy.config.core.v3.Node`).

/// Identity and metadata of a connecting client, sent on the first request of
/// a stream.
#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Node {
    /// Opaque node identifier.
    #[prost(string, tag = "1")]
    pub id: ::prost::alloc::string::String,
    /// Cluster the node belongs to.
    #[prost(string, tag = "2")]
    pub cluster: ::prost::alloc::string::String,
    /// Free-form metadata. Well-known keys select per-proxy behavior such as
    /// the bound generator.
    #[prost(message, optional, tag = "3")]
    pub metadata: ::core::option::Option<::prost_types::Struct>,
    /// User agent name advertised by the client.
    #[prost(string, tag = "6")]
    pub user_agent_name: ::prost::alloc::string::String,
    /// Locality of the node.
    #[prost(message, optional, tag = "9")]
    pub locality: ::core::option::Option<Locality>,
}

/// Where the node runs.
#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Locality {
    /// Region.
    #[prost(string, tag = "1")]
    pub region: ::prost::alloc::string::String,
    /// Zone within the region.
    #[prost(string, tag = "2")]
    pub zone: ::prost::alloc::string::String,
    /// Sub-zone within the zone.
    #[prost(string, tag = "3")]
    pub sub_zone: ::prost::alloc::string::String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message;

    #[test]
    fn node_round_trips_through_codec() {
        let node = Node {
            id: "gateway-7f9c".into(),
            cluster: "edge".into(),
            metadata: None,
            user_agent_name: "helmsman-test".into(),
            locality: Some(Locality {
                region: "us-west".into(),
                zone: "us-west-2a".into(),
                sub_zone: String::new(),
            }),
        };

        let decoded = Node::decode(node.encode_to_vec().as_slice()).unwrap();
        assert_eq!(decoded, node);
    }
}
