use std::path::Path;

use crate::compose::dctypes::ComposeFile;

const TIMEZONE_FILES: [&str; 2] = ["/etc/localtime", "/etc/timezone"];

/// Mount the host's timezone files read-only into every service, unless a
/// mount already uses the path as source or occupies the target.
pub fn mount_timezone_files(doc: &mut ComposeFile) {
    let present: Vec<&str> = TIMEZONE_FILES
        .iter()
        .copied()
        .filter(|p| Path::new(p).exists())
        .collect();
    mount_host_files(doc, &present);
}

pub(crate) fn mount_host_files(doc: &mut ComposeFile, hosts: &[&str]) {
    for svc in doc.services.0.values_mut() {
        for host in hosts {
            let taken = svc.volumes.iter().any(|mount| {
                let mut parts = mount.split(':');
                let source = parts.next().unwrap_or_default();
                let target = parts.next().unwrap_or_default();
                source == *host || target == *host
            });
            if !taken {
                svc.volumes.push(format!("{host}:{host}:ro"));
            }
        }
    }
}

/// Services without an explicit `TZ` entry inherit the host's via the
/// `${TZ}` placeholder, resolved at execution time.
pub fn ensure_tz_variable(doc: &mut ComposeFile) {
    for svc in doc.services.0.values_mut() {
        if !svc.environment.contains_key("TZ") {
            svc.environment.set("TZ", "${TZ}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::parse_document;

    #[test]
    fn mounts_skip_existing_source_or_target() {
        let raw = concat!(
            "services:\n",
            "  a:\n",
            "    image: x\n",
            "    volumes:\n",
            "      - /etc/localtime:/etc/localtime:ro\n",
            "  b:\n",
            "    image: x\n",
            "    volumes:\n",
            "      - ./tz:/etc/timezone\n",
        );
        let mut doc = parse_document(raw).unwrap();
        mount_host_files(&mut doc, &["/etc/localtime", "/etc/timezone"]);

        let a = &doc.services.0["a"].volumes;
        assert_eq!(
            a,
            &vec![
                "/etc/localtime:/etc/localtime:ro".to_string(),
                "/etc/timezone:/etc/timezone:ro".to_string(),
            ]
        );
        let b = &doc.services.0["b"].volumes;
        assert_eq!(
            b,
            &vec![
                "./tz:/etc/timezone".to_string(),
                "/etc/localtime:/etc/localtime:ro".to_string(),
            ]
        );
    }

    #[test]
    fn tz_variable_is_appended_once() {
        let raw = concat!(
            "services:\n",
            "  a:\n",
            "    image: x\n",
            "  b:\n",
            "    image: x\n",
            "    environment:\n",
            "      - TZ=Europe/Vienna\n",
        );
        let mut doc = parse_document(raw).unwrap();
        ensure_tz_variable(&mut doc);
        ensure_tz_variable(&mut doc);

        assert_eq!(
            doc.services.0["a"].environment.get("TZ").as_deref(),
            Some("${TZ}")
        );
        assert_eq!(
            doc.services.0["b"].environment.get("TZ").as_deref(),
            Some("Europe/Vienna")
        );
    }
}
