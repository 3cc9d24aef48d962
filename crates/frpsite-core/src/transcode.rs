// ── INI ⇄ structured-config transcoder ──
//
// Pure and stateless: raw frpc INI text in, `ParsedConfig` out, and back.
// The device registry lives in a comment block the tunnel client itself
// never reads:
//
//   # DEVICE_REGISTRY_START
//   # MAC|siteCode|siteName|password|tag1,tag2
//   # DEVICE_REGISTRY_END
//
// Parsing never fails. Malformed lines are skipped and collected as
// warnings; arbitrary garbage degrades to an all-empty document.

use indexmap::IndexMap;
use std::collections::HashMap;
use std::fmt::Write as _;
use tracing::warn;

use crate::model::{DEFAULT_BIND_ADDR, Device, MacAddress, ProxyConfig, STCP_TYPE, Site, VISITOR_ROLE};

/// Opens the device registry comment block.
pub const DEVICE_REGISTRY_START: &str = "# DEVICE_REGISTRY_START";

/// Closes the device registry comment block.
pub const DEVICE_REGISTRY_END: &str = "# DEVICE_REGISTRY_END";

/// A non-fatal parse diagnostic: the offending line was skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseWarning {
    /// 1-based line number in the input text.
    pub line: usize,
    pub message: String,
}

/// An opaque named section passed through unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub name: String,
    pub entries: IndexMap<String, String>,
}

/// Structured view of one frpc configuration file.
///
/// `common` and `other_sections` are pass-through state: the registry
/// never edits them, so unrecognized configuration survives a
/// load→mutate→save cycle. Array order is serialization order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedConfig {
    pub common: IndexMap<String, String>,
    pub devices: Vec<Device>,
    pub stcp_configs: Vec<ProxyConfig>,
    pub other_sections: Vec<Section>,
    pub warnings: Vec<ParseWarning>,
}

impl ParsedConfig {
    fn warn(&mut self, line: usize, message: impl Into<String>) {
        let message = message.into();
        warn!(line, "{message}");
        self.warnings.push(ParseWarning { line, message });
    }
}

// ── parse ───────────────────────────────────────────────────────────

/// Parse raw INI text into a [`ParsedConfig`].
///
/// Line-by-line, each line trimmed. Never fails: empty or non-INI input
/// yields an all-empty document, malformed lines become warnings.
pub fn parse(text: &str) -> ParsedConfig {
    let mut cfg = ParsedConfig::default();
    let mut in_registry = false;
    let mut current: Option<(String, IndexMap<String, String>)> = None;

    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim();
        let lineno = idx + 1;

        if line.is_empty() {
            continue;
        }

        if line == DEVICE_REGISTRY_START {
            in_registry = true;
            continue;
        }
        if line == DEVICE_REGISTRY_END {
            in_registry = false;
            continue;
        }

        if line.starts_with('#') {
            // Inside the registry block, `# MAC|...` lines are records;
            // every other comment is discarded.
            if in_registry && line.starts_with("# ") && line.contains('|') {
                let record = line.trim_start_matches('#').trim();
                match parse_device_record(record) {
                    Some(device) => cfg.devices.push(device),
                    None => cfg.warn(lineno, "device record has fewer than 2 usable fields"),
                }
            }
            continue;
        }

        if let Some(name) = section_header(line) {
            flush_section(&mut cfg, current.take());
            current = Some((name.to_owned(), IndexMap::new()));
            continue;
        }

        match line.split_once('=') {
            Some((key, value)) => {
                if let Some((_, entries)) = current.as_mut() {
                    entries.insert(key.trim().to_owned(), value.trim().to_owned());
                } else {
                    cfg.warn(lineno, "key-value line outside any section");
                }
            }
            None => cfg.warn(lineno, "line is neither a section header nor a key-value pair"),
        }
    }

    flush_section(&mut cfg, current.take());
    cfg
}

/// `[name]` → `name`; anything else is not a section header.
fn section_header(line: &str) -> Option<&str> {
    line.strip_prefix('[')?.strip_suffix(']').map(str::trim)
}

/// Parse one pipe-delimited registry record:
/// `MAC|siteCode|siteName|password|tag1,tag2`. Missing trailing fields
/// default to empty; fewer than two fields (or an empty MAC) is a
/// discard.
fn parse_device_record(record: &str) -> Option<Device> {
    let fields: Vec<&str> = record.split('|').map(str::trim).collect();
    let mac = fields.first().copied().unwrap_or_default();
    if fields.len() < 2 || mac.is_empty() {
        return None;
    }

    let mut device = Device::new(MacAddress::new(mac));
    device.site_code = field(&fields, 1);
    device.site_name = field(&fields, 2);
    device.password = field(&fields, 3);
    device.tags = fields
        .get(4)
        .map(|tags| {
            tags.split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(ToOwned::to_owned)
                .collect()
        })
        .unwrap_or_default();
    Some(device)
}

fn field(fields: &[&str], idx: usize) -> String {
    fields.get(idx).copied().unwrap_or_default().to_owned()
}

/// Route a finished section into the right bucket. A section named
/// `common` is flattened; `type = stcp` sections become proxy configs
/// with defaults filled in; everything else passes through verbatim.
/// Empty sections are dropped.
fn flush_section(cfg: &mut ParsedConfig, section: Option<(String, IndexMap<String, String>)>) {
    let Some((name, entries)) = section else {
        return;
    };
    if entries.is_empty() {
        return;
    }

    if name == "common" {
        cfg.common.extend(entries);
    } else if entries.get("type").is_some_and(|t| t == STCP_TYPE) {
        cfg.stcp_configs.push(proxy_from_entries(name, entries));
    } else {
        cfg.other_sections.push(Section { name, entries });
    }
}

fn proxy_from_entries(name: String, mut entries: IndexMap<String, String>) -> ProxyConfig {
    let mut take = |key: &str| entries.shift_remove(key);
    ProxyConfig {
        proxy_type: take("type").unwrap_or_else(|| STCP_TYPE.to_owned()),
        role: take("role").unwrap_or_else(|| VISITOR_ROLE.to_owned()),
        sk: take("sk").unwrap_or_default(),
        server_name: take("server_name").unwrap_or_default(),
        bind_addr: take("bind_addr").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_owned()),
        bind_port: take("bind_port")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0),
        name,
    }
}

// ── generate ────────────────────────────────────────────────────────

/// Serialize a [`ParsedConfig`] back to canonical INI text.
///
/// Deterministic and order-preserving: `[common]` (when non-empty), the
/// device registry block, one section per stcp config in array order
/// with a fixed field order, then the pass-through sections. Saving the
/// same document twice produces byte-identical output.
pub fn generate(cfg: &ParsedConfig) -> String {
    let mut out = String::new();

    if !cfg.common.is_empty() {
        out.push_str("[common]\n");
        for (key, value) in &cfg.common {
            let _ = writeln!(out, "{key} = {value}");
        }
        out.push('\n');
    }

    let _ = writeln!(out, "{DEVICE_REGISTRY_START}");
    for device in &cfg.devices {
        let _ = writeln!(
            out,
            "# {}|{}|{}|{}|{}",
            device.mac,
            device.site_code,
            device.site_name,
            device.password,
            device.tags.join(",")
        );
    }
    let _ = writeln!(out, "{DEVICE_REGISTRY_END}");
    out.push('\n');

    for proxy in &cfg.stcp_configs {
        let _ = writeln!(out, "[{}]", proxy.name);
        let _ = writeln!(out, "type = {}", proxy.proxy_type);
        let _ = writeln!(out, "role = {}", proxy.role);
        let _ = writeln!(out, "sk = {}", proxy.sk);
        let _ = writeln!(out, "server_name = {}", proxy.server_name);
        let _ = writeln!(out, "bind_addr = {}", proxy.bind_addr);
        let _ = writeln!(out, "bind_port = {}", proxy.bind_port);
        out.push('\n');
    }

    for section in &cfg.other_sections {
        let _ = writeln!(out, "[{}]", section.name);
        for (key, value) in &section.entries {
            let _ = writeln!(out, "{key} = {value}");
        }
        out.push('\n');
    }

    out
}

// ── grouping ────────────────────────────────────────────────────────

/// Group proxy configs into sites by their `sk`.
///
/// Lookup is by normalized MAC; a proxy whose `sk` matches no device
/// gets a placeholder device synthesized from the raw sk. Result order
/// is first-seen MAC order. Devices with zero proxies are NOT included
/// here -- use [`sites_from_config`] when they must survive.
pub fn group_configs_by_site(stcp_configs: &[ProxyConfig], devices: &[Device]) -> Vec<Site> {
    let mut order: Vec<MacAddress> = Vec::new();
    let mut groups: HashMap<MacAddress, Site> = HashMap::new();

    for proxy in stcp_configs {
        let key = MacAddress::new(&proxy.sk);
        let site = groups.entry(key.clone()).or_insert_with(|| {
            order.push(key.clone());
            match devices.iter().find(|d| d.mac == key) {
                Some(device) => Site::new(device.clone()),
                None => Site::new(Device::placeholder(&proxy.sk)),
            }
        });
        site.configs.push(proxy.clone());
    }

    order.into_iter().filter_map(|key| groups.remove(&key)).collect()
}

/// Build the full site list for a parsed document: every registered
/// device appears (even with zero proxies), then orphan-sk groups in
/// first-seen order. This is the seeded variant `load()` uses so that
/// registered-but-unprovisioned sites are not silently lost.
pub fn sites_from_config(cfg: &ParsedConfig) -> Vec<Site> {
    let mut order: Vec<MacAddress> = Vec::new();
    let mut groups: HashMap<MacAddress, Site> = HashMap::new();

    for device in &cfg.devices {
        if !groups.contains_key(&device.mac) {
            order.push(device.mac.clone());
            groups.insert(device.mac.clone(), Site::new(device.clone()));
        }
    }

    for proxy in &cfg.stcp_configs {
        let key = MacAddress::new(&proxy.sk);
        let site = groups.entry(key.clone()).or_insert_with(|| {
            order.push(key.clone());
            Site::new(Device::placeholder(&proxy.sk))
        });
        site.configs.push(proxy.clone());
    }

    order.into_iter().filter_map(|key| groups.remove(&key)).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const FULL_SAMPLE: &str = "\
[common]
server_addr = frps.example.com
server_port = 7000

# DEVICE_REGISTRY_START
# E721EE345A01|DC001|苏州站|pw1|测试,在线
# DEVICE_REGISTRY_END

[R-E721EE345A01-22]
type = stcp
role = visitor
sk = E721EE345A01
server_name = R-E721EE345A01-22
bind_addr = 0.0.0.0
bind_port = 18015

[plugin_unix]
plugin = unix_domain_socket
plugin_unix_path = /var/run/docker.sock
";

    #[test]
    fn parses_common_registry_and_proxy() {
        let cfg = parse(FULL_SAMPLE);

        assert_eq!(cfg.common.get("server_addr").unwrap(), "frps.example.com");
        assert_eq!(cfg.devices.len(), 1);
        let device = &cfg.devices[0];
        assert_eq!(device.mac.as_str(), "E721EE345A01");
        assert_eq!(device.site_code, "DC001");
        assert_eq!(device.site_name, "苏州站");
        assert_eq!(device.password, "pw1");
        assert_eq!(device.tags, vec!["测试", "在线"]);

        assert_eq!(cfg.stcp_configs.len(), 1);
        let proxy = &cfg.stcp_configs[0];
        assert_eq!(proxy.name, "R-E721EE345A01-22");
        assert_eq!(proxy.bind_port, 18015);

        assert_eq!(cfg.other_sections.len(), 1);
        assert_eq!(cfg.other_sections[0].name, "plugin_unix");
        assert!(cfg.warnings.is_empty());
    }

    // Scenario: registry block plus one stcp section groups into one site.
    #[test]
    fn grouping_attaches_proxy_to_registered_device() {
        let cfg = parse(FULL_SAMPLE);
        let sites = group_configs_by_site(&cfg.stcp_configs, &cfg.devices);

        assert_eq!(sites.len(), 1);
        let site = &sites[0];
        assert_eq!(site.mac().as_str(), "E721EE345A01");
        assert_eq!(site.device.site_code, "DC001");
        assert_eq!(site.device.tags, vec!["测试", "在线"]);
        assert_eq!(site.configs.len(), 1);
        assert_eq!(site.configs[0].bind_port, 18015);
    }

    #[test]
    fn stcp_section_defaults_missing_fields() {
        let cfg = parse("[R-AABBCCDDEEFF-22]\ntype = stcp\nsk = AABBCCDDEEFF\n");

        let proxy = &cfg.stcp_configs[0];
        assert_eq!(proxy.role, "visitor");
        assert_eq!(proxy.bind_addr, "0.0.0.0");
        assert_eq!(proxy.bind_port, 0);
    }

    #[test]
    fn unparsable_bind_port_falls_back_to_sentinel() {
        let cfg = parse("[x]\ntype = stcp\nbind_port = not-a-number\n");
        assert_eq!(cfg.stcp_configs[0].bind_port, 0);
    }

    #[test]
    fn value_may_contain_equals_sign() {
        let cfg = parse("[common]\ntoken = abc=def==\n");
        assert_eq!(cfg.common.get("token").unwrap(), "abc=def==");
    }

    // Scenario: junk inside a section is skipped, never fatal.
    #[test]
    fn invalid_line_inside_section_is_ignored_with_warning() {
        let cfg = parse("[common]\nserver_port = 7000\nnot a valid line\n");

        assert_eq!(cfg.common.len(), 1);
        assert_eq!(cfg.warnings.len(), 1);
        assert_eq!(cfg.warnings[0].line, 3);
        let text = generate(&cfg);
        assert!(!text.contains("not a valid line"));
    }

    #[test]
    fn key_value_before_any_section_is_ignored() {
        let cfg = parse("stray = value\n[common]\nserver_port = 7000\n");
        assert_eq!(cfg.common.len(), 1);
        assert_eq!(cfg.warnings.len(), 1);
    }

    #[test]
    fn registry_record_needs_a_mac_and_a_delimiter() {
        // An all-empty-metadata record (our own generate output for a
        // bare device) must survive.
        let text = "# DEVICE_REGISTRY_START\n# AABBCCDDEEFF||||\n# DEVICE_REGISTRY_END\n";
        let cfg = parse(text);
        assert_eq!(cfg.devices.len(), 1);
        assert_eq!(cfg.devices[0].mac.as_str(), "AABBCCDDEEFF");
        assert_eq!(cfg.devices[0].site_code, "");
        assert!(cfg.warnings.is_empty());

        // No MAC at all is a discard.
        let cfg = parse("# DEVICE_REGISTRY_START\n# |x\n# DEVICE_REGISTRY_END\n");
        assert!(cfg.devices.is_empty());
        assert_eq!(cfg.warnings.len(), 1);
    }

    #[test]
    fn comments_outside_registry_are_discarded() {
        let cfg = parse("# MAC|looks|like|a|record\n[common]\na = 1\n");
        assert!(cfg.devices.is_empty());
        assert_eq!(cfg.common.len(), 1);
    }

    #[test]
    fn empty_input_yields_empty_config() {
        let cfg = parse("");
        assert_eq!(cfg, ParsedConfig::default());

        let cfg = parse("complete garbage\nwith no structure");
        assert!(cfg.common.is_empty());
        assert!(cfg.devices.is_empty());
        assert!(cfg.stcp_configs.is_empty());
        assert!(cfg.other_sections.is_empty());
    }

    #[test]
    fn generate_is_deterministic() {
        let cfg = parse(FULL_SAMPLE);
        assert_eq!(generate(&cfg), generate(&cfg));
    }

    #[test]
    fn round_trip_preserves_all_records() {
        let first = parse(FULL_SAMPLE);
        let second = parse(&generate(&first));

        assert_eq!(first.common, second.common);
        assert_eq!(first.devices, second.devices);
        assert_eq!(first.stcp_configs, second.stcp_configs);
        assert_eq!(first.other_sections, second.other_sections);
    }

    #[test]
    fn round_trip_survives_multiple_sites_and_sections() {
        let mut cfg = ParsedConfig::default();
        cfg.common.insert("server_addr".into(), "10.0.0.1".into());
        for (i, mac) in ["AABBCCDDEE01", "AABBCCDDEE02"].iter().enumerate() {
            let mac = MacAddress::new(mac);
            let mut device = Device::new(mac.clone());
            device.site_code = format!("DC{i:03}");
            cfg.devices.push(device);
            for service in [22u16, 3306] {
                let mut proxy = ProxyConfig::visitor("E", &mac, service);
                proxy.bind_port = 18000 + u16::try_from(cfg.stcp_configs.len()).unwrap();
                cfg.stcp_configs.push(proxy);
            }
        }
        let mut entries = IndexMap::new();
        entries.insert("local_port".into(), "8080".into());
        cfg.other_sections.push(Section {
            name: "web".into(),
            entries,
        });

        let reparsed = parse(&generate(&cfg));
        assert_eq!(reparsed.common, cfg.common);
        assert_eq!(reparsed.devices, cfg.devices);
        assert_eq!(reparsed.stcp_configs, cfg.stcp_configs);
        assert_eq!(reparsed.other_sections, cfg.other_sections);
    }

    #[test]
    fn orphan_sk_synthesizes_placeholder_site() {
        let cfg = parse("[R-FFFFFFFFFFFF-22]\ntype = stcp\nsk = FFFFFFFFFFFF\nbind_port = 18001\n");
        let sites = group_configs_by_site(&cfg.stcp_configs, &cfg.devices);

        assert_eq!(sites.len(), 1);
        assert_eq!(sites[0].device.site_code, "FFFFFFFFFFFF");
        assert_eq!(sites[0].device.password, "");
        assert!(sites[0].device.tags.is_empty());
    }

    #[test]
    fn grouping_excludes_zero_proxy_devices() {
        let text = "# DEVICE_REGISTRY_START\n# AABBCCDDEE01|DC001\n# DEVICE_REGISTRY_END\n";
        let cfg = parse(text);

        assert!(group_configs_by_site(&cfg.stcp_configs, &cfg.devices).is_empty());

        // ...while the seeded variant keeps them.
        let sites = sites_from_config(&cfg);
        assert_eq!(sites.len(), 1);
        assert!(sites[0].configs.is_empty());
    }

    #[test]
    fn sites_from_config_orders_devices_first_then_orphans() {
        let text = "\
# DEVICE_REGISTRY_START
# AABBCCDDEE01|DC001
# AABBCCDDEE02|DC002
# DEVICE_REGISTRY_END

[R-FFFFFFFFFFFF-22]
type = stcp
sk = FFFFFFFFFFFF
bind_port = 18001

[R-AABBCCDDEE02-22]
type = stcp
sk = AABBCCDDEE02
bind_port = 18002
";
        let sites = sites_from_config(&parse(text));

        let macs: Vec<&str> = sites.iter().map(|s| s.mac().as_str()).collect();
        assert_eq!(macs, vec!["AABBCCDDEE01", "AABBCCDDEE02", "FFFFFFFFFFFF"]);
        assert!(sites[0].configs.is_empty());
        assert_eq!(sites[1].configs.len(), 1);
        assert_eq!(sites[2].configs.len(), 1);
    }

    #[test]
    fn sk_matching_is_case_insensitive() {
        let text = "\
# DEVICE_REGISTRY_START
# AABBCCDDEE01|DC001
# DEVICE_REGISTRY_END

[R-aabbccddee01-22]
type = stcp
sk = aa:bb:cc:dd:ee:01
bind_port = 18001
";
        let sites = sites_from_config(&parse(text));
        assert_eq!(sites.len(), 1);
        assert_eq!(sites[0].device.site_code, "DC001");
        assert_eq!(sites[0].configs.len(), 1);
    }
}
