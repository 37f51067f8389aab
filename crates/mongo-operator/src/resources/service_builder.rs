use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use rand::Rng;

use crate::constants::ports;
use crate::naming::ClusterIdentity;

/// Build the externally reachable Service of one replica.
///
/// `observed_node_port` is the port already assigned to the live Service, if
/// any. It is kept as-is so client endpoints survive re-reconciliation. A new
/// port is drawn only when nothing was observed.
pub fn build_slot_service(
    identity: &ClusterIdentity,
    slot: u32,
    observed_node_port: Option<i32>,
) -> Service {
    let node_port = observed_node_port.unwrap_or_else(random_node_port);

    Service {
        metadata: ObjectMeta {
            name: Some(identity.slot_name(slot)),
            namespace: Some(identity.namespace.clone()),
            labels: Some(super::slot_labels(identity, slot)),
            ..Default::default()
        },
        spec: Some(ServiceSpec {
            type_: Some("LoadBalancer".into()),
            selector: Some(super::slot_selector(identity, slot)),
            ports: Some(vec![ServicePort {
                protocol: Some("TCP".into()),
                port: ports::MONGO,
                target_port: Some(IntOrString::Int(ports::MONGO)),
                node_port: Some(node_port),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// The node port of an observed Service's first port.
pub fn node_port(service: &Service) -> Option<i32> {
    service
        .spec
        .as_ref()?
        .ports
        .as_ref()?
        .first()?
        .node_port
}

fn random_node_port() -> i32 {
    rand::thread_rng().gen_range(ports::NODE_PORT_MIN..ports::NODE_PORT_MAX)
}
