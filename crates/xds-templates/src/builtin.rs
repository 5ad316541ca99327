//! Built-in renderers.

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use xds_core::{DiscoveryRequest, InstanceRecord, RenderError, RenderingContext};

use crate::renderer::{RenderOutput, Renderer};
use crate::template::XdsTemplate;

/// Identity of the built-in clusters renderer, bumped whenever its output changes.
const CLUSTERS_SOURCE: &[u8] = b"builtin:clusters:strict_dns:v1";

/// Renders one `STRICT_DNS` cluster per instance.
///
/// Each instance needs a `name` and an `endpoints` list of
/// `{address, port}` objects. Endpoints carrying a `region` are grouped
/// into a locality per region, in order of first appearance.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClustersRenderer;

impl ClustersRenderer {
    /// The renderer wrapped as a template with a stable checksum.
    pub fn template() -> XdsTemplate {
        XdsTemplate::new(ClustersRenderer, CLUSTERS_SOURCE).with_origin("builtin:clusters")
    }

    fn cluster(instance: &InstanceRecord) -> Result<Value, RenderError> {
        let name = instance
            .name()
            .ok_or_else(|| RenderError::renderer("instance has no string `name`"))?;
        let endpoints: &[Value] = match instance.get("endpoints") {
            Some(Value::Array(endpoints)) => endpoints.as_slice(),
            None | Some(Value::Null) => &[],
            Some(_) => {
                return Err(RenderError::renderer(format!(
                    "instance {name}: `endpoints` is not a list"
                )))
            }
        };

        Ok(json!({
            "name": name,
            "type": "STRICT_DNS",
            "connect_timeout": "5.000s",
            "tls_context": {},
            "load_assignment": {
                "cluster_name": format!("{name}_cluster"),
                "endpoints": locality_lb_endpoints(name, endpoints)?,
            },
        }))
    }
}

#[async_trait]
impl Renderer for ClustersRenderer {
    async fn render(
        &self,
        context: &RenderingContext,
        _request: &DiscoveryRequest,
    ) -> Result<RenderOutput, RenderError> {
        context
            .instances()
            .iter()
            .map(Self::cluster)
            .collect::<Result<Vec<_>, _>>()
            .map(RenderOutput::Resources)
    }
}

/// Group upstream endpoints into Envoy locality entries.
fn locality_lb_endpoints(cluster: &str, upstreams: &[Value]) -> Result<Vec<Value>, RenderError> {
    let mut localities: Vec<(Option<&str>, Vec<Value>)> = Vec::new();

    for upstream in upstreams {
        let address = upstream.get("address").and_then(Value::as_str);
        let port = upstream.get("port").and_then(Value::as_u64);
        let (Some(address), Some(port)) = (address, port) else {
            return Err(RenderError::renderer(format!(
                "instance {cluster}: endpoint needs `address` and numeric `port`"
            )));
        };
        let region = upstream.get("region").and_then(Value::as_str);

        let lb_endpoint = json!({
            "endpoint": {
                "address": {
                    "socket_address": {"address": address, "port_value": port}
                }
            }
        });
        match localities.iter_mut().find(|(r, _)| *r == region) {
            Some((_, entries)) => entries.push(lb_endpoint),
            None => localities.push((region, vec![lb_endpoint])),
        }
    }

    Ok(localities
        .into_iter()
        .map(|(region, lb_endpoints)| {
            let mut locality = Map::new();
            if let Some(region) = region {
                locality.insert("locality".into(), json!({"zone": region}));
            }
            locality.insert("lb_endpoints".into(), Value::Array(lb_endpoints));
            Value::Object(locality)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use xds_core::Node;

    async fn render(instances: Vec<Value>) -> Result<Vec<Value>, RenderError> {
        let records = instances
            .into_iter()
            .filter_map(InstanceRecord::from_value)
            .collect();
        let ctx = RenderingContext::builder()
            .instances(Arc::new(records))
            .build();
        let request = DiscoveryRequest::new(Node::new("n1", "T1", "abc/1.15/RELEASE"));
        ClustersRenderer::template().render(&ctx, &request).await
    }

    #[tokio::test]
    async fn renders_strict_dns_cluster() {
        let resources = render(vec![json!({
            "name": "svcA",
            "endpoints": [{"address": "svca.internal", "port": 443}]
        })])
        .await
        .unwrap();

        assert_eq!(
            resources,
            vec![json!({
                "name": "svcA",
                "type": "STRICT_DNS",
                "connect_timeout": "5.000s",
                "tls_context": {},
                "load_assignment": {
                    "cluster_name": "svcA_cluster",
                    "endpoints": [{
                        "lb_endpoints": [{
                            "endpoint": {"address": {"socket_address": {
                                "address": "svca.internal", "port_value": 443
                            }}}
                        }]
                    }]
                }
            })]
        );
    }

    #[tokio::test]
    async fn groups_endpoints_by_region() {
        let resources = render(vec![json!({
            "name": "svcB",
            "endpoints": [
                {"address": "a", "port": 80, "region": "east"},
                {"address": "b", "port": 80, "region": "west"},
                {"address": "c", "port": 80, "region": "east"}
            ]
        })])
        .await
        .unwrap();

        let localities = resources[0]["load_assignment"]["endpoints"].as_array().unwrap();
        assert_eq!(localities.len(), 2);
        assert_eq!(localities[0]["locality"]["zone"], "east");
        assert_eq!(localities[0]["lb_endpoints"].as_array().unwrap().len(), 2);
        assert_eq!(localities[1]["locality"]["zone"], "west");
    }

    #[tokio::test]
    async fn no_instances_renders_nothing() {
        assert!(render(vec![]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn bad_endpoint_is_render_error() {
        let err = render(vec![json!({"name": "svcC", "endpoints": [{"address": "a"}]})])
            .await
            .unwrap_err();
        assert!(matches!(err, RenderError::Renderer { .. }));
    }
}
