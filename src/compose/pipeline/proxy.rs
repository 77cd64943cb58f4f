use regex::Regex;

use crate::compose::dctypes::{ComposeFile, Service};

const HTTPS_PORTS: [u16; 2] = [443, 8443];
const CONFIG_PORT_HINTS: [&str; 6] = [
    "listen_port",
    "bind_port",
    "server_port",
    "http_port",
    "https_port",
    "port",
];
const NET_BIND_SERVICE: &str = "NET_BIND_SERVICE";
const UNPRIVILEGED_PORT_SYSCTL: &str = "net.ipv4.ip_unprivileged_port_start";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
        }
    }

    fn for_port(port: u16) -> Self {
        if HTTPS_PORTS.contains(&port) {
            Self::Https
        } else {
            Self::Http
        }
    }
}

fn env_ports(svc: &Service) -> Vec<u16> {
    svc.environment
        .entries()
        .into_iter()
        .filter(|(k, _)| k.to_uppercase().contains("PORT"))
        .filter_map(|(_, v)| v.trim().parse::<u16>().ok())
        .filter(|p| *p > 0)
        .collect()
}

fn label_ports(svc: &Service) -> Vec<u16> {
    svc.labels
        .entries()
        .into_iter()
        .filter(|(k, _)| k.to_lowercase().contains("port"))
        .filter_map(|(_, v)| v.trim().parse::<u16>().ok())
        .filter(|p| *p > 0)
        .collect()
}

/// Port literals in inline config bodies: lines mentioning a port-ish
/// keyword contribute their first integer.
fn config_ports(doc: &ComposeFile, svc: &Service) -> Vec<u16> {
    let number = Regex::new(r"(\d{1,5})").expect("port literal pattern");
    let mut ports = Vec::new();
    for config in &svc.configs {
        let Some(body) = doc.config_content(config.source()) else {
            continue;
        };
        for line in body.lines() {
            let lowered = line.to_lowercase();
            if !CONFIG_PORT_HINTS.iter().any(|hint| lowered.contains(hint)) {
                continue;
            }
            if let Some(m) = number.find(&lowered) {
                if let Ok(port) = m.as_str().parse::<u16>() {
                    if port > 0 {
                        ports.push(port);
                    }
                }
            }
        }
    }
    ports
}

/// First match wins, probing sources in a fixed order: declared port
/// mappings (container side), environment, labels, config bodies.
fn detect_http_port(doc: &ComposeFile, svc: &Service) -> Option<(u16, Scheme)> {
    let port = svc
        .container_ports()
        .into_iter()
        .next()
        .or_else(|| env_ports(svc).into_iter().next())
        .or_else(|| label_ports(svc).into_iter().next())
        .or_else(|| config_ports(doc, svc).into_iter().next())?;
    Some((port, Scheme::for_port(port)))
}

/// Reverse-proxy label synthesis. Detected services get a router rule,
/// entrypoint and TLS flags, and loadbalancer port/scheme; labels the
/// author wrote always win. `http.port` / `https.port` short-hands force
/// the outcome and are stripped.
pub fn apply_proxy_labels(doc: &mut ComposeFile) {
    let names: Vec<String> = doc.services.0.keys().cloned().collect();
    for name in names {
        let forced = {
            let svc = doc.services.0.get_mut(&name).expect("service by key");
            let http = svc.labels.remove("http.port");
            let https = svc.labels.remove("https.port");
            match (http, https) {
                (_, Some(p)) => p.trim().parse::<u16>().ok().map(|p| (p, Scheme::Https)),
                (Some(p), None) => p.trim().parse::<u16>().ok().map(|p| (p, Scheme::Http)),
                (None, None) => None,
            }
        };

        let choice = forced.or_else(|| {
            let svc = &doc.services.0[&name];
            detect_http_port(doc, svc)
        });
        let Some((port, scheme)) = choice else {
            continue;
        };

        let rule = format!(
            "Host(`{name}.localhost`) || Host(`{name}.${{PUBLIC_DOMAIN_NAME}}`) || Host(`{name}`)"
        );
        let svc = doc.services.0.get_mut(&name).expect("service by key");
        svc.labels
            .insert_if_absent(&format!("traefik.http.routers.{name}.rule"), &rule);
        svc.labels
            .insert_if_absent(&format!("traefik.http.routers.{name}.entrypoints"), "https");
        svc.labels
            .insert_if_absent(&format!("traefik.http.routers.{name}.tls"), "true");
        svc.labels.insert_if_absent(
            &format!("traefik.http.services.{name}.loadbalancer.server.port"),
            &port.to_string(),
        );
        svc.labels.insert_if_absent(
            &format!("traefik.http.services.{name}.loadbalancer.server.scheme"),
            scheme.as_str(),
        );
    }
}

/// Binding below 1024 inside the container needs `NET_BIND_SERVICE` and a
/// lowered `ip_unprivileged_port_start`.
pub fn grant_privileged_ports(doc: &mut ComposeFile) {
    let names: Vec<String> = doc.services.0.keys().cloned().collect();
    for name in names {
        let lowest = {
            let svc = &doc.services.0[&name];
            let mut ports = svc.container_ports();
            ports.extend(env_ports(svc));
            ports.extend(label_ports(svc));
            ports.extend(config_ports(doc, svc));
            ports.into_iter().filter(|p| *p < 1024).min()
        };
        let Some(lowest) = lowest else {
            continue;
        };

        let svc = doc.services.0.get_mut(&name).expect("service by key");
        if !svc.cap_add.iter().any(|c| c == NET_BIND_SERVICE) {
            svc.cap_add.push(NET_BIND_SERVICE.to_string());
        }
        svc.sysctls
            .insert_if_absent(UNPRIVILEGED_PORT_SYSCTL, &lowest.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::parse_document;

    #[test]
    fn declared_ports_drive_proxy_labels() {
        let raw = concat!(
            "services:\n",
            "  web:\n",
            "    image: nginx\n",
            "    ports:\n",
            "      - \"8080:80\"\n",
            "    labels:\n",
            "      traefik.enable: \"true\"\n",
        );
        let mut doc = parse_document(raw).unwrap();
        apply_proxy_labels(&mut doc);

        let labels = &doc.services.0["web"].labels;
        assert_eq!(
            labels
                .get("traefik.http.services.web.loadbalancer.server.port")
                .as_deref(),
            Some("80")
        );
        assert_eq!(
            labels
                .get("traefik.http.services.web.loadbalancer.server.scheme")
                .as_deref(),
            Some("http")
        );
        let rule = labels.get("traefik.http.routers.web.rule").unwrap();
        assert!(rule.contains("Host(`web.localhost`)"));
        assert!(rule.contains("Host(`web.${PUBLIC_DOMAIN_NAME}`)"));
        assert_eq!(
            labels.get("traefik.http.routers.web.entrypoints").as_deref(),
            Some("https")
        );
        assert_eq!(labels.get("traefik.enable").as_deref(), Some("true"));
    }

    #[test]
    fn tls_ports_imply_https_scheme() {
        let raw = concat!(
            "services:\n",
            "  vault:\n",
            "    image: vault\n",
            "    ports:\n",
            "      - \"8443:8443\"\n",
        );
        let mut doc = parse_document(raw).unwrap();
        apply_proxy_labels(&mut doc);
        assert_eq!(
            doc.services.0["vault"]
                .labels
                .get("traefik.http.services.vault.loadbalancer.server.scheme")
                .as_deref(),
            Some("https")
        );
    }

    #[test]
    fn shorthand_labels_force_and_are_stripped() {
        let raw = concat!(
            "services:\n",
            "  app:\n",
            "    image: x\n",
            "    ports:\n",
            "      - \"9000:9000\"\n",
            "    labels:\n",
            "      https.port: \"7443\"\n",
        );
        let mut doc = parse_document(raw).unwrap();
        apply_proxy_labels(&mut doc);

        let labels = &doc.services.0["app"].labels;
        assert!(labels.get("https.port").is_none());
        assert_eq!(
            labels
                .get("traefik.http.services.app.loadbalancer.server.port")
                .as_deref(),
            Some("7443")
        );
        assert_eq!(
            labels
                .get("traefik.http.services.app.loadbalancer.server.scheme")
                .as_deref(),
            Some("https")
        );
    }

    #[test]
    fn user_labels_are_never_overwritten() {
        let raw = concat!(
            "services:\n",
            "  web:\n",
            "    image: nginx\n",
            "    ports:\n",
            "      - \"80:80\"\n",
            "    labels:\n",
            "      traefik.http.routers.web.rule: Host(`custom.example`)\n",
        );
        let mut doc = parse_document(raw).unwrap();
        apply_proxy_labels(&mut doc);
        assert_eq!(
            doc.services.0["web"]
                .labels
                .get("traefik.http.routers.web.rule")
                .as_deref(),
            Some("Host(`custom.example`)")
        );
    }

    #[test]
    fn environment_ports_are_the_second_source() {
        let raw = concat!(
            "services:\n",
            "  api:\n",
            "    image: x\n",
            "    environment:\n",
            "      - APP_PORT=3000\n",
        );
        let mut doc = parse_document(raw).unwrap();
        apply_proxy_labels(&mut doc);
        assert_eq!(
            doc.services.0["api"]
                .labels
                .get("traefik.http.services.api.loadbalancer.server.port")
                .as_deref(),
            Some("3000")
        );
    }

    #[test]
    fn config_bodies_are_the_last_source() {
        let raw = concat!(
            "services:\n",
            "  svc:\n",
            "    image: x\n",
            "    configs:\n",
            "      - source: app_conf\n",
            "        target: /etc/app.conf\n",
            "configs:\n",
            "  app_conf:\n",
            "    content: |\n",
            "      listen_port = 8088\n",
        );
        let mut doc = parse_document(raw).unwrap();
        apply_proxy_labels(&mut doc);
        assert_eq!(
            doc.services.0["svc"]
                .labels
                .get("traefik.http.services.svc.loadbalancer.server.port")
                .as_deref(),
            Some("8088")
        );
    }

    #[test]
    fn privileged_ports_add_capability_and_sysctl() {
        let raw = concat!(
            "services:\n",
            "  web:\n",
            "    image: nginx\n",
            "    ports:\n",
            "      - \"80:80\"\n",
        );
        let mut doc = parse_document(raw).unwrap();
        grant_privileged_ports(&mut doc);
        grant_privileged_ports(&mut doc);

        let svc = &doc.services.0["web"];
        assert_eq!(svc.cap_add, vec!["NET_BIND_SERVICE"]);
        assert!(svc
            .sysctls
            .contains_key("net.ipv4.ip_unprivileged_port_start"));
    }

    #[test]
    fn unprivileged_services_stay_untouched() {
        let raw = concat!(
            "services:\n",
            "  app:\n",
            "    image: x\n",
            "    ports:\n",
            "      - \"8080:8080\"\n",
        );
        let mut doc = parse_document(raw).unwrap();
        grant_privileged_ports(&mut doc);
        let svc = &doc.services.0["app"];
        assert!(svc.cap_add.is_empty());
        assert!(svc.sysctls.is_empty());
    }
}
