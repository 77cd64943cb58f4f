use crate::compose::dctypes::{ComposeFile, MapOrEmpty, NetworkDecl, VolumeDecl};

/// The conventional shared network joining every managed stack.
pub const SHARED_NETWORK: &str = "homelab";

pub fn ensure_shared_network(doc: &mut ComposeFile) {
    for svc in doc.services.0.values_mut() {
        svc.networks.ensure(SHARED_NETWORK);
    }
}

/// A mount source is a named volume when it is not a path reference.
fn named_volume_source(mount: &str) -> Option<&str> {
    let (source, _) = mount.split_once(':')?;
    if source.is_empty()
        || source.starts_with('/')
        || source.starts_with("./")
        || source.starts_with("../")
    {
        return None;
    }
    Some(source)
}

/// Every named volume or network referenced by a service must exist in
/// the top-level mappings; missing ones are declared `external: true`.
pub fn declare_missing_resources(doc: &mut ComposeFile) {
    let mut volumes: Vec<String> = Vec::new();
    let mut networks: Vec<String> = Vec::new();
    for svc in doc.services.0.values() {
        for mount in &svc.volumes {
            if let Some(source) = named_volume_source(mount) {
                if !volumes.iter().any(|v| v == source) {
                    volumes.push(source.to_string());
                }
            }
        }
        for name in svc.networks.names() {
            if !networks.iter().any(|n| n == &name) {
                networks.push(name);
            }
        }
    }

    for name in volumes {
        if !doc.volumes.0.contains_key(&name) {
            doc.volumes.0.insert(
                name,
                MapOrEmpty::Map(VolumeDecl {
                    external: true,
                    ..Default::default()
                }),
            );
        }
    }
    for name in networks {
        if !doc.networks.0.contains_key(&name) {
            doc.networks.0.insert(
                name,
                MapOrEmpty::Map(NetworkDecl {
                    external: true,
                    ..Default::default()
                }),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::parse_document;

    #[test]
    fn shared_network_joins_every_representation() {
        let raw = concat!(
            "services:\n",
            "  a:\n",
            "    image: x\n",
            "  b:\n",
            "    image: x\n",
            "    networks: front\n",
            "  c:\n",
            "    image: x\n",
            "    networks:\n",
            "      front:\n",
            "        aliases: [web]\n",
        );
        let mut doc = parse_document(raw).unwrap();
        ensure_shared_network(&mut doc);
        for svc in doc.services.0.values() {
            assert!(svc.networks.contains(SHARED_NETWORK));
        }
        assert!(doc.services.0["b"].networks.contains("front"));
    }

    #[test]
    fn undeclared_resources_become_external() {
        let raw = concat!(
            "services:\n",
            "  app:\n",
            "    image: x\n",
            "    networks: [proxy]\n",
            "    volumes:\n",
            "      - data:/var/lib/data\n",
            "      - ./conf:/etc/conf\n",
            "      - /tmp/x:/x\n",
            "volumes:\n",
            "  declared:\n",
            "    driver: local\n",
        );
        let mut doc = parse_document(raw).unwrap();
        declare_missing_resources(&mut doc);

        let data = doc.volumes.0["data"].as_ref().unwrap();
        assert!(data.external);
        assert!(!doc.volumes.0.contains_key("./conf"));
        assert!(doc.networks.0["proxy"].as_ref().unwrap().external);
        // a declared volume keeps its authored body
        assert_eq!(
            doc.volumes.0["declared"].as_ref().unwrap().driver.as_deref(),
            Some("local")
        );
    }
}
