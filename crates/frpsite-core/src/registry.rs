// ── Site registry ──
//
// The authoritative in-memory site list. Explicitly constructed and
// handed to consumers -- there is no global instance. All mutations are
// plain synchronous methods; the registry is only ever touched by one
// logical caller at a time, so invariants are checked eagerly and hold
// after every call:
//
//   1. every owned config's sk agrees with its device's MAC
//   2. no two sites share a MAC address
//   3. no two sites share a non-empty site code
//   4. no two configs share a non-zero bind port

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::error::CoreError;
use crate::model::{DEFAULT_SERVICE_PORTS, MacAddress, ProxyConfig, Site};
use crate::ports;
use crate::transcode::ParsedConfig;

/// Reserved virtual tag grouping sites that have no tags of their own.
/// Used for filtering only -- never stored in `site.tags`.
pub const UNTAGGED_TAG: &str = "无标签";

// ── Batch reports ───────────────────────────────────────────────────

/// One failed entry of a batch import.
#[derive(Debug)]
pub struct ImportFailure {
    pub mac: MacAddress,
    pub error: CoreError,
}

/// Outcome of [`SiteRegistry::import_sites`]: partial success is a
/// first-class result, not an error.
#[derive(Debug, Default)]
pub struct ImportReport {
    pub success_count: usize,
    pub errors: Vec<ImportFailure>,
}

/// Outcome of [`SiteRegistry::import_with_duplicate_check`]. The
/// duplicates are returned untouched so a UI can ask before
/// overwriting.
#[derive(Debug, Default)]
pub struct DuplicateCheckReport {
    pub success_count: usize,
    pub errors: Vec<ImportFailure>,
    pub duplicates: Vec<Site>,
}

/// Outcome of [`SiteRegistry::import_with_overwrite`]. Skipped
/// duplicates count neither as success nor as error.
#[derive(Debug, Default)]
pub struct OverwriteReport {
    pub success_count: usize,
    pub overwritten_count: usize,
    pub errors: Vec<ImportFailure>,
}

// ── Partial update ──────────────────────────────────────────────────

/// Shallow-merge update for [`SiteRegistry::update_site`]: `None`
/// fields are left alone.
#[derive(Debug, Clone, Default)]
pub struct SiteUpdate {
    pub mac: Option<MacAddress>,
    pub site_code: Option<String>,
    pub site_name: Option<String>,
    pub password: Option<String>,
    pub tags: Option<Vec<String>>,
    pub configs: Option<Vec<ProxyConfig>>,
}

impl SiteUpdate {
    pub fn site_code(code: impl Into<String>) -> Self {
        Self {
            site_code: Some(code.into()),
            ..Self::default()
        }
    }

    pub fn site_name(name: impl Into<String>) -> Self {
        Self {
            site_name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn configs(configs: Vec<ProxyConfig>) -> Self {
        Self {
            configs: Some(configs),
            ..Self::default()
        }
    }
}

// ── Registry ────────────────────────────────────────────────────────

/// The authoritative in-memory site list plus the retained baseline
/// document, so `common` and unrecognized sections round-trip untouched
/// across a load→mutate→save cycle.
#[derive(Debug)]
pub struct SiteRegistry {
    sites: Vec<Site>,
    baseline: Option<ParsedConfig>,
    last_sync: Option<DateTime<Utc>>,
    start_port: u16,
    proxy_prefix: String,
}

impl SiteRegistry {
    pub fn new() -> Self {
        Self::with_options(ports::DEFAULT_START_PORT, "R")
    }

    /// Registry with a custom allocation start port and proxy-name
    /// prefix (the prefix is a site-convention, not a protocol value).
    pub fn with_options(start_port: u16, proxy_prefix: impl Into<String>) -> Self {
        Self {
            sites: Vec::new(),
            baseline: None,
            last_sync: None,
            start_port,
            proxy_prefix: proxy_prefix.into(),
        }
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn sites(&self) -> &[Site] {
        &self.sites
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    pub fn site(&self, mac: &MacAddress) -> Option<&Site> {
        self.sites.iter().find(|s| s.mac() == mac)
    }

    pub fn contains(&self, mac: &MacAddress) -> bool {
        self.site(mac).is_some()
    }

    pub fn last_sync(&self) -> Option<DateTime<Utc>> {
        self.last_sync
    }

    pub fn has_baseline(&self) -> bool {
        self.baseline.is_some()
    }

    pub fn proxy_prefix(&self) -> &str {
        &self.proxy_prefix
    }

    // ── CRUD ─────────────────────────────────────────────────────────

    /// Append a new site. Fails on MAC, site-code, or bind-port
    /// collision; the registry is unchanged on failure.
    pub fn add_site(&mut self, mut site: Site) -> Result<(), CoreError> {
        self.validate_new(&site)?;
        align_sk(&mut site);
        self.sites.push(site);
        Ok(())
    }

    /// Shallow-merge `update` into the site keyed by `mac`.
    ///
    /// MAC and site-code changes are re-validated against the *other*
    /// sites; a MAC change rewrites each owned config's `sk`; a config
    /// replacement is re-validated for bind-port uniqueness.
    pub fn update_site(&mut self, mac: &MacAddress, update: SiteUpdate) -> Result<(), CoreError> {
        let idx = self
            .index_of(mac)
            .ok_or_else(|| CoreError::SiteNotFound { mac: mac.clone() })?;

        if let Some(new_mac) = &update.mac {
            if self.other_site_has_mac(idx, new_mac) {
                return Err(CoreError::DuplicateMac {
                    mac: new_mac.clone(),
                });
            }
        }
        if let Some(code) = &update.site_code {
            if !code.is_empty() && self.other_site_has_code(idx, code) {
                return Err(CoreError::DuplicateSiteCode { code: code.clone() });
            }
        }
        if let Some(configs) = &update.configs {
            self.validate_ports(idx, configs)?;
        }

        let site = &mut self.sites[idx];
        if let Some(new_mac) = update.mac {
            site.device.mac = new_mac;
        }
        if let Some(code) = update.site_code {
            site.device.site_code = code;
        }
        if let Some(name) = update.site_name {
            site.device.site_name = name;
        }
        if let Some(password) = update.password {
            site.device.password = password;
        }
        if let Some(tags) = update.tags {
            site.device.tags = tags;
        }
        if let Some(configs) = update.configs {
            site.configs = configs;
        }
        align_sk(site);
        Ok(())
    }

    /// Remove a site and all its proxy configs.
    pub fn delete_site(&mut self, mac: &MacAddress) -> Result<Site, CoreError> {
        let idx = self
            .index_of(mac)
            .ok_or_else(|| CoreError::SiteNotFound { mac: mac.clone() })?;
        Ok(self.sites.remove(idx))
    }

    // ── Batch import ─────────────────────────────────────────────────

    /// Add each entry independently; failures are collected, the batch
    /// never aborts.
    pub fn import_sites(&mut self, sites: Vec<Site>) -> ImportReport {
        let mut report = ImportReport::default();
        for site in sites {
            let mac = site.mac().clone();
            match self.add_site(site) {
                Ok(()) => report.success_count += 1,
                Err(error) => report.errors.push(ImportFailure { mac, error }),
            }
        }
        report
    }

    /// Partition out entries whose MAC already exists, import only the
    /// rest, and hand the duplicates back for a confirmation step.
    pub fn import_with_duplicate_check(&mut self, sites: Vec<Site>) -> DuplicateCheckReport {
        let (duplicates, fresh): (Vec<Site>, Vec<Site>) =
            sites.into_iter().partition(|site| self.contains(site.mac()));
        let report = self.import_sites(fresh);
        DuplicateCheckReport {
            success_count: report.success_count,
            errors: report.errors,
            duplicates,
        }
    }

    /// Import with an explicit duplicate policy: duplicates are either
    /// overwritten in place (mutable fields only) or skipped entirely.
    pub fn import_with_overwrite(&mut self, sites: Vec<Site>, overwrite: bool) -> OverwriteReport {
        let mut report = OverwriteReport::default();
        for site in sites {
            let mac = site.mac().clone();
            match self.index_of(&mac) {
                Some(idx) => {
                    if !overwrite {
                        continue;
                    }
                    match self.replace_site(idx, site) {
                        Ok(()) => report.overwritten_count += 1,
                        Err(error) => report.errors.push(ImportFailure { mac, error }),
                    }
                }
                None => match self.add_site(site) {
                    Ok(()) => report.success_count += 1,
                    Err(error) => report.errors.push(ImportFailure { mac, error }),
                },
            }
        }
        report
    }

    // ── Port allocation ──────────────────────────────────────────────

    /// Every non-sentinel bind port currently claimed by any config.
    /// Collected fresh on every call -- never cached.
    pub fn used_ports(&self) -> HashSet<u16> {
        self.sites
            .iter()
            .flat_map(|site| site.configs.iter())
            .map(|config| config.bind_port)
            .filter(|port| *port != 0)
            .collect()
    }

    /// The next free bind port, scanning up from the configured start.
    pub fn allocate_bind_port(&self) -> Result<u16, CoreError> {
        ports::allocate(&self.used_ports(), self.start_port, ports::MAX_PORT)
    }

    /// Build the three default visitor configs (SSH, MySQL, web panel)
    /// for a site, with mutually distinct bind ports.
    pub fn generate_default_configs(&self, mac: &MacAddress) -> Result<Vec<ProxyConfig>, CoreError> {
        let mut used = self.used_ports();
        let mut configs = Vec::with_capacity(DEFAULT_SERVICE_PORTS.len());
        for service in DEFAULT_SERVICE_PORTS {
            let port = ports::allocate(&used, self.start_port, ports::MAX_PORT)?;
            used.insert(port);
            let mut proxy = ProxyConfig::visitor(&self.proxy_prefix, mac, service);
            proxy.bind_port = port;
            configs.push(proxy);
        }
        Ok(configs)
    }

    /// Generate the default configs and attach them to an existing site.
    pub fn provision_default_configs(
        &mut self,
        mac: &MacAddress,
    ) -> Result<Vec<ProxyConfig>, CoreError> {
        let idx = self
            .index_of(mac)
            .ok_or_else(|| CoreError::SiteNotFound { mac: mac.clone() })?;
        let configs = self.generate_default_configs(mac)?;
        self.sites[idx].configs.extend(configs.iter().cloned());
        Ok(configs)
    }

    /// Resolve every "allocate on save" sentinel to a fresh port.
    /// Returns how many ports were assigned.
    pub fn resolve_pending_ports(&mut self) -> Result<usize, CoreError> {
        let mut used = self.used_ports();
        let start = self.start_port;
        let mut resolved = 0;
        for site in &mut self.sites {
            for config in &mut site.configs {
                if config.is_pending() {
                    let port = ports::allocate(&used, start, ports::MAX_PORT)?;
                    used.insert(port);
                    config.bind_port = port;
                    resolved += 1;
                }
            }
        }
        Ok(resolved)
    }

    // ── Tags ─────────────────────────────────────────────────────────

    /// Add a tag to a site. Trimmed; an exact-match duplicate is a
    /// no-op returning `Ok(false)`.
    pub fn add_tag(&mut self, mac: &MacAddress, tag: &str) -> Result<bool, CoreError> {
        let tag = tag.trim();
        let site = self
            .site_mut(mac)
            .ok_or_else(|| CoreError::SiteNotFound { mac: mac.clone() })?;
        if tag.is_empty() || site.device.tags.iter().any(|t| t == tag) {
            return Ok(false);
        }
        site.device.tags.push(tag.to_owned());
        Ok(true)
    }

    /// Remove a tag from a site; `Ok(false)` if it wasn't there.
    pub fn remove_tag(&mut self, mac: &MacAddress, tag: &str) -> Result<bool, CoreError> {
        let site = self
            .site_mut(mac)
            .ok_or_else(|| CoreError::SiteNotFound { mac: mac.clone() })?;
        let before = site.device.tags.len();
        site.device.tags.retain(|t| t != tag);
        Ok(site.device.tags.len() < before)
    }

    /// All filterable tags: the untagged virtual tag first, then every
    /// stored tag in first-seen order.
    pub fn all_tags(&self) -> Vec<String> {
        let mut tags = vec![UNTAGGED_TAG.to_owned()];
        for site in &self.sites {
            for tag in &site.device.tags {
                if !tags.contains(tag) {
                    tags.push(tag.clone());
                }
            }
        }
        tags
    }

    /// Sites carrying `tag`; the untagged virtual tag selects sites
    /// with no tags at all.
    pub fn sites_with_tag(&self, tag: &str) -> Vec<&Site> {
        self.sites
            .iter()
            .filter(|site| {
                if tag == UNTAGGED_TAG {
                    site.device.tags.is_empty()
                } else {
                    site.device.tags.iter().any(|t| t == tag)
                }
            })
            .collect()
    }

    // ── Sync integration ─────────────────────────────────────────────

    /// Replace the whole registry state from a freshly loaded document.
    pub fn install_loaded(&mut self, sites: Vec<Site>, baseline: ParsedConfig) {
        self.sites = sites;
        self.baseline = Some(baseline);
        self.last_sync = Some(Utc::now());
    }

    /// Rehydrate the retained baseline from current registry state:
    /// devices and stcp configs come from the site list, everything
    /// else passes through untouched.
    pub fn snapshot_config(&self) -> Result<ParsedConfig, CoreError> {
        let baseline = self.baseline.as_ref().ok_or(CoreError::NoBaseline)?;
        let mut doc = baseline.clone();
        doc.devices = self.sites.iter().map(|site| site.device.clone()).collect();
        doc.stcp_configs = self
            .sites
            .iter()
            .flat_map(|site| site.configs.iter().cloned())
            .collect();
        doc.warnings = Vec::new();
        Ok(doc)
    }

    /// Record a successful push of `doc` as the new baseline.
    pub fn mark_saved(&mut self, doc: ParsedConfig) {
        self.baseline = Some(doc);
        self.last_sync = Some(Utc::now());
    }

    // ── Private helpers ──────────────────────────────────────────────

    fn index_of(&self, mac: &MacAddress) -> Option<usize> {
        self.sites.iter().position(|s| s.mac() == mac)
    }

    fn site_mut(&mut self, mac: &MacAddress) -> Option<&mut Site> {
        self.sites.iter_mut().find(|s| s.mac() == mac)
    }

    fn other_site_has_mac(&self, idx: usize, mac: &MacAddress) -> bool {
        self.sites
            .iter()
            .enumerate()
            .any(|(i, s)| i != idx && s.mac() == mac)
    }

    fn other_site_has_code(&self, idx: usize, code: &str) -> bool {
        self.sites
            .iter()
            .enumerate()
            .any(|(i, s)| i != idx && s.device.site_code == code)
    }

    fn validate_new(&self, site: &Site) -> Result<(), CoreError> {
        if self.contains(site.mac()) {
            return Err(CoreError::DuplicateMac {
                mac: site.mac().clone(),
            });
        }
        let code = &site.device.site_code;
        if !code.is_empty() && self.sites.iter().any(|s| s.device.site_code == *code) {
            return Err(CoreError::DuplicateSiteCode { code: code.clone() });
        }
        self.validate_ports(usize::MAX, &site.configs)
    }

    /// Check that `configs` introduces no bind-port collision, ignoring
    /// ports owned by the site at `idx` (pass `usize::MAX` for "none").
    fn validate_ports(&self, idx: usize, configs: &[ProxyConfig]) -> Result<(), CoreError> {
        let mut seen: HashSet<u16> = self
            .sites
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != idx)
            .flat_map(|(_, site)| site.configs.iter())
            .map(|config| config.bind_port)
            .filter(|port| *port != 0)
            .collect();
        for config in configs {
            if config.bind_port != 0 && !seen.insert(config.bind_port) {
                return Err(CoreError::DuplicateBindPort {
                    port: config.bind_port,
                });
            }
        }
        Ok(())
    }

    fn replace_site(&mut self, idx: usize, incoming: Site) -> Result<(), CoreError> {
        let code = &incoming.device.site_code;
        if !code.is_empty() && self.other_site_has_code(idx, code) {
            return Err(CoreError::DuplicateSiteCode { code: code.clone() });
        }
        self.validate_ports(idx, &incoming.configs)?;

        let site = &mut self.sites[idx];
        site.device.site_code = incoming.device.site_code;
        site.device.site_name = incoming.device.site_name;
        site.device.password = incoming.device.password;
        site.device.tags = incoming.device.tags;
        site.configs = incoming.configs;
        align_sk(site);
        Ok(())
    }
}

impl Default for SiteRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Ownership implies agreement: every config's sk is the owning
/// device's MAC.
fn align_sk(site: &mut Site) {
    let mac = site.device.mac.as_str().to_owned();
    for config in &mut site.configs {
        config.sk.clone_from(&mac);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::Device;

    fn site(mac: &str, code: &str) -> Site {
        let mut device = Device::new(MacAddress::new(mac));
        device.site_code = code.to_owned();
        Site::new(device)
    }

    fn site_with_port(mac: &str, code: &str, port: u16) -> Site {
        let mut s = site(mac, code);
        let mut proxy = ProxyConfig::visitor("R", s.mac(), 22);
        proxy.bind_port = port;
        s.configs.push(proxy);
        s
    }

    fn mac(raw: &str) -> MacAddress {
        MacAddress::new(raw)
    }

    // Scenario: the second add with the same MAC fails.
    #[test]
    fn add_site_rejects_duplicate_mac() {
        let mut registry = SiteRegistry::new();
        registry.add_site(site("AABBCCDDEE01", "DC001")).unwrap();

        let err = registry.add_site(site("aa:bb:cc:dd:ee:01", "DC002")).unwrap_err();
        assert!(matches!(err, CoreError::DuplicateMac { .. }));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn add_site_rejects_duplicate_site_code() {
        let mut registry = SiteRegistry::new();
        registry.add_site(site("AABBCCDDEE01", "DC001")).unwrap();

        let err = registry.add_site(site("AABBCCDDEE02", "DC001")).unwrap_err();
        assert!(matches!(err, CoreError::DuplicateSiteCode { .. }));
    }

    #[test]
    fn empty_site_codes_do_not_collide() {
        let mut registry = SiteRegistry::new();
        registry.add_site(site("AABBCCDDEE01", "")).unwrap();
        registry.add_site(site("AABBCCDDEE02", "")).unwrap();
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn add_site_rejects_bind_port_collision() {
        let mut registry = SiteRegistry::new();
        registry
            .add_site(site_with_port("AABBCCDDEE01", "DC001", 18015))
            .unwrap();

        let err = registry
            .add_site(site_with_port("AABBCCDDEE02", "DC002", 18015))
            .unwrap_err();
        assert!(matches!(err, CoreError::DuplicateBindPort { port: 18015 }));
    }

    #[test]
    fn sentinel_ports_may_repeat() {
        let mut registry = SiteRegistry::new();
        registry
            .add_site(site_with_port("AABBCCDDEE01", "DC001", 0))
            .unwrap();
        registry
            .add_site(site_with_port("AABBCCDDEE02", "DC002", 0))
            .unwrap();
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn add_site_aligns_config_sk() {
        let mut registry = SiteRegistry::new();
        let mut incoming = site("AABBCCDDEE01", "DC001");
        let mut proxy = ProxyConfig::visitor("R", &mac("FFFFFFFFFFFF"), 22);
        proxy.bind_port = 18000;
        incoming.configs.push(proxy);

        registry.add_site(incoming).unwrap();
        assert_eq!(
            registry.site(&mac("AABBCCDDEE01")).unwrap().configs[0].sk,
            "AABBCCDDEE01"
        );
    }

    #[test]
    fn update_site_merges_fields() {
        let mut registry = SiteRegistry::new();
        registry.add_site(site("AABBCCDDEE01", "DC001")).unwrap();

        registry
            .update_site(&mac("AABBCCDDEE01"), SiteUpdate::site_name("苏州站"))
            .unwrap();

        let updated = registry.site(&mac("AABBCCDDEE01")).unwrap();
        assert_eq!(updated.device.site_name, "苏州站");
        assert_eq!(updated.device.site_code, "DC001");
    }

    #[test]
    fn update_site_unknown_mac_is_not_found() {
        let mut registry = SiteRegistry::new();
        let err = registry
            .update_site(&mac("AABBCCDDEE01"), SiteUpdate::site_name("x"))
            .unwrap_err();
        assert!(matches!(err, CoreError::SiteNotFound { .. }));
    }

    #[test]
    fn update_site_rejects_code_collision_with_other_site() {
        let mut registry = SiteRegistry::new();
        registry.add_site(site("AABBCCDDEE01", "DC001")).unwrap();
        registry.add_site(site("AABBCCDDEE02", "DC002")).unwrap();

        let err = registry
            .update_site(&mac("AABBCCDDEE02"), SiteUpdate::site_code("DC001"))
            .unwrap_err();
        assert!(matches!(err, CoreError::DuplicateSiteCode { .. }));

        // Re-asserting a site's own code is fine.
        registry
            .update_site(&mac("AABBCCDDEE02"), SiteUpdate::site_code("DC002"))
            .unwrap();
    }

    #[test]
    fn mac_change_rewrites_config_sk() {
        let mut registry = SiteRegistry::new();
        registry
            .add_site(site_with_port("AABBCCDDEE01", "DC001", 18000))
            .unwrap();

        let update = SiteUpdate {
            mac: Some(mac("AABBCCDDEE99")),
            ..SiteUpdate::default()
        };
        registry.update_site(&mac("AABBCCDDEE01"), update).unwrap();

        let moved = registry.site(&mac("AABBCCDDEE99")).unwrap();
        assert_eq!(moved.configs[0].sk, "AABBCCDDEE99");
        assert!(registry.site(&mac("AABBCCDDEE01")).is_none());
    }

    #[test]
    fn config_update_rejects_port_taken_by_other_site() {
        let mut registry = SiteRegistry::new();
        registry
            .add_site(site_with_port("AABBCCDDEE01", "DC001", 18015))
            .unwrap();
        registry.add_site(site("AABBCCDDEE02", "DC002")).unwrap();

        let mut proxy = ProxyConfig::visitor("R", &mac("AABBCCDDEE02"), 22);
        proxy.bind_port = 18015;
        let err = registry
            .update_site(&mac("AABBCCDDEE02"), SiteUpdate::configs(vec![proxy]))
            .unwrap_err();
        assert!(matches!(err, CoreError::DuplicateBindPort { port: 18015 }));

        // Reusing the site's own port is fine.
        let mut proxy = ProxyConfig::visitor("R", &mac("AABBCCDDEE01"), 3306);
        proxy.bind_port = 18015;
        registry
            .update_site(&mac("AABBCCDDEE01"), SiteUpdate::configs(vec![proxy]))
            .unwrap();
    }

    #[test]
    fn delete_site_removes_it_and_frees_ports() {
        let mut registry = SiteRegistry::new();
        registry
            .add_site(site_with_port("AABBCCDDEE01", "DC001", 18000))
            .unwrap();

        registry.delete_site(&mac("AABBCCDDEE01")).unwrap();
        assert!(registry.is_empty());
        assert_eq!(registry.allocate_bind_port().unwrap(), 18000);

        let err = registry.delete_site(&mac("AABBCCDDEE01")).unwrap_err();
        assert!(matches!(err, CoreError::SiteNotFound { .. }));
    }

    #[test]
    fn import_collects_per_entry_failures() {
        let mut registry = SiteRegistry::new();
        registry.add_site(site("AABBCCDDEE01", "DC001")).unwrap();

        let report = registry.import_sites(vec![
            site("AABBCCDDEE02", "DC002"),
            site("AABBCCDDEE01", "DC003"), // duplicate MAC
            site("AABBCCDDEE03", "DC002"), // duplicate code (just imported)
            site("AABBCCDDEE04", "DC004"),
        ]);

        assert_eq!(report.success_count, 2);
        assert_eq!(report.errors.len(), 2);
        assert!(matches!(report.errors[0].error, CoreError::DuplicateMac { .. }));
        assert!(matches!(
            report.errors[1].error,
            CoreError::DuplicateSiteCode { .. }
        ));
        assert_eq!(registry.len(), 3);
    }

    // Scenario: one new site, one existing -> 1 success, 1 duplicate.
    #[test]
    fn duplicate_check_partitions_before_importing() {
        let mut registry = SiteRegistry::new();
        registry.add_site(site("AABBCCDDEE01", "DC001")).unwrap();

        let report = registry.import_with_duplicate_check(vec![
            site("AABBCCDDEE02", "DC002"),
            site("AABBCCDDEE01", "DC999"),
        ]);

        assert_eq!(report.success_count, 1);
        assert!(report.errors.is_empty());
        assert_eq!(report.duplicates.len(), 1);
        assert_eq!(report.duplicates[0].mac(), &mac("AABBCCDDEE01"));
        // The existing site was not touched.
        assert_eq!(
            registry.site(&mac("AABBCCDDEE01")).unwrap().device.site_code,
            "DC001"
        );
    }

    #[test]
    fn overwrite_replaces_mutable_fields_in_place() {
        let mut registry = SiteRegistry::new();
        let mut existing = site("AABBCCDDEE01", "DC001");
        existing.device.tags = vec!["旧".into()];
        registry.add_site(existing).unwrap();

        let mut incoming = site("AABBCCDDEE01", "DC777");
        incoming.device.site_name = "新名字".into();
        incoming.device.tags = vec!["新".into()];

        let report =
            registry.import_with_overwrite(vec![incoming, site("AABBCCDDEE02", "DC002")], true);

        assert_eq!(report.success_count, 1);
        assert_eq!(report.overwritten_count, 1);
        assert!(report.errors.is_empty());

        let replaced = registry.site(&mac("AABBCCDDEE01")).unwrap();
        assert_eq!(replaced.device.site_code, "DC777");
        assert_eq!(replaced.device.site_name, "新名字");
        assert_eq!(replaced.device.tags, vec!["新"]);
    }

    #[test]
    fn overwrite_false_skips_duplicates_silently() {
        let mut registry = SiteRegistry::new();
        registry.add_site(site("AABBCCDDEE01", "DC001")).unwrap();

        let report =
            registry.import_with_overwrite(vec![site("AABBCCDDEE01", "DC777")], false);

        assert_eq!(report.success_count, 0);
        assert_eq!(report.overwritten_count, 0);
        assert!(report.errors.is_empty());
        assert_eq!(
            registry.site(&mac("AABBCCDDEE01")).unwrap().device.site_code,
            "DC001"
        );
    }

    // Scenario: {18015, 18016, 18017} in use -> 18018 comes next.
    #[test]
    fn allocate_bind_port_skips_used() {
        let mut registry = SiteRegistry::with_options(18015, "R");
        let mut s = site("AABBCCDDEE01", "DC001");
        for (i, service) in [22u16, 3306, 5000].iter().enumerate() {
            let mut proxy = ProxyConfig::visitor("R", s.mac(), *service);
            proxy.bind_port = 18015 + u16::try_from(i).unwrap();
            s.configs.push(proxy);
        }
        registry.add_site(s).unwrap();

        assert_eq!(registry.allocate_bind_port().unwrap(), 18018);
    }

    // Scenario: fresh registry -> three distinct ports from the start.
    #[test]
    fn default_configs_get_distinct_ports_from_start() {
        let mut registry = SiteRegistry::new();
        registry.add_site(site("E721EE345A01", "DC001")).unwrap();

        let configs = registry
            .provision_default_configs(&mac("E721EE345A01"))
            .unwrap();

        assert_eq!(configs.len(), 3);
        let services: Vec<Option<u16>> = configs.iter().map(ProxyConfig::service_port).collect();
        assert_eq!(services, vec![Some(22), Some(3306), Some(5000)]);
        let ports: Vec<u16> = configs.iter().map(|c| c.bind_port).collect();
        assert_eq!(ports, vec![18000, 18001, 18002]);
        assert_eq!(configs[0].name, "R-E721EE345A01-22");

        let attached = registry.site(&mac("E721EE345A01")).unwrap();
        assert_eq!(attached.configs.len(), 3);
    }

    #[test]
    fn provisioning_unknown_site_fails_without_allocating() {
        let mut registry = SiteRegistry::new();
        let err = registry
            .provision_default_configs(&mac("AABBCCDDEE01"))
            .unwrap_err();
        assert!(matches!(err, CoreError::SiteNotFound { .. }));
    }

    #[test]
    fn resolve_pending_ports_assigns_distinct_free_ports() {
        let mut registry = SiteRegistry::new();
        registry
            .add_site(site_with_port("AABBCCDDEE01", "DC001", 18000))
            .unwrap();
        let mut pending = site("AABBCCDDEE02", "DC002");
        pending
            .configs
            .push(ProxyConfig::visitor("R", &mac("AABBCCDDEE02"), 22));
        pending
            .configs
            .push(ProxyConfig::visitor("R", &mac("AABBCCDDEE02"), 3306));
        registry.add_site(pending).unwrap();

        let resolved = registry.resolve_pending_ports().unwrap();
        assert_eq!(resolved, 2);

        let site = registry.site(&mac("AABBCCDDEE02")).unwrap();
        assert_eq!(site.configs[0].bind_port, 18001);
        assert_eq!(site.configs[1].bind_port, 18002);

        // Second pass is a no-op.
        assert_eq!(registry.resolve_pending_ports().unwrap(), 0);
    }

    #[test]
    fn tag_add_is_noop_on_duplicate() {
        let mut registry = SiteRegistry::new();
        registry.add_site(site("AABBCCDDEE01", "DC001")).unwrap();
        let key = mac("AABBCCDDEE01");

        assert!(registry.add_tag(&key, " 测试 ").unwrap());
        assert!(!registry.add_tag(&key, "测试").unwrap());
        assert!(registry.add_tag(&key, "在线").unwrap());

        let tags = &registry.site(&key).unwrap().device.tags;
        assert_eq!(tags, &vec!["测试".to_owned(), "在线".to_owned()]);

        assert!(registry.remove_tag(&key, "测试").unwrap());
        assert!(!registry.remove_tag(&key, "测试").unwrap());
    }

    #[test]
    fn untagged_virtual_tag_filters_but_is_never_stored() {
        let mut registry = SiteRegistry::new();
        registry.add_site(site("AABBCCDDEE01", "DC001")).unwrap();
        let mut tagged = site("AABBCCDDEE02", "DC002");
        tagged.device.tags = vec!["在线".into()];
        registry.add_site(tagged).unwrap();

        assert_eq!(registry.all_tags(), vec![UNTAGGED_TAG.to_owned(), "在线".to_owned()]);

        let untagged = registry.sites_with_tag(UNTAGGED_TAG);
        assert_eq!(untagged.len(), 1);
        assert_eq!(untagged[0].mac(), &mac("AABBCCDDEE01"));
        assert!(
            !untagged[0]
                .device
                .tags
                .iter()
                .any(|t| t == UNTAGGED_TAG)
        );

        assert_eq!(registry.sites_with_tag("在线").len(), 1);
    }

    #[test]
    fn uniqueness_holds_across_operation_sequences() {
        let mut registry = SiteRegistry::new();
        registry.add_site(site_with_port("AABBCCDDEE01", "DC001", 18000)).unwrap();
        registry.add_site(site("AABBCCDDEE02", "DC002")).unwrap();
        registry.delete_site(&mac("AABBCCDDEE01")).unwrap();
        registry.add_site(site_with_port("AABBCCDDEE03", "DC003", 18000)).unwrap();
        let _ = registry.import_with_overwrite(
            vec![site("AABBCCDDEE02", "DC999"), site("AABBCCDDEE04", "DC004")],
            true,
        );
        registry.provision_default_configs(&mac("AABBCCDDEE04")).unwrap();
        registry.resolve_pending_ports().unwrap();

        let macs: Vec<_> = registry.sites().iter().map(|s| s.mac().as_str()).collect();
        let unique_macs: HashSet<_> = macs.iter().copied().collect();
        assert_eq!(macs.len(), unique_macs.len());

        let codes: Vec<_> = registry
            .sites()
            .iter()
            .map(|s| s.device.site_code.as_str())
            .filter(|c| !c.is_empty())
            .collect();
        let unique_codes: HashSet<_> = codes.iter().copied().collect();
        assert_eq!(codes.len(), unique_codes.len());

        let ports: Vec<u16> = registry
            .sites()
            .iter()
            .flat_map(|s| s.configs.iter())
            .map(|c| c.bind_port)
            .filter(|p| *p != 0)
            .collect();
        let unique_ports: HashSet<_> = ports.iter().copied().collect();
        assert_eq!(ports.len(), unique_ports.len());
    }

    #[test]
    fn snapshot_requires_baseline() {
        let registry = SiteRegistry::new();
        assert!(matches!(
            registry.snapshot_config().unwrap_err(),
            CoreError::NoBaseline
        ));
    }

    #[test]
    fn snapshot_rehydrates_from_sites() {
        let mut registry = SiteRegistry::new();
        let mut baseline = ParsedConfig::default();
        baseline
            .common
            .insert("server_addr".into(), "frps.example.com".into());
        registry.install_loaded(Vec::new(), baseline);

        registry
            .add_site(site_with_port("AABBCCDDEE01", "DC001", 18000))
            .unwrap();

        let doc = registry.snapshot_config().unwrap();
        assert_eq!(doc.common.get("server_addr").unwrap(), "frps.example.com");
        assert_eq!(doc.devices.len(), 1);
        assert_eq!(doc.stcp_configs.len(), 1);
        assert_eq!(doc.stcp_configs[0].bind_port, 18000);
    }
}
