//! YAML profiles: a rule catalog plus the sheet layout it writes into.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use invrec_core::{Scope, SheetLayout};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{
    builtin, compile, require_group, CustomFn, ExtractionRule, IdentityOptions, RuleError,
    RuleSet, Strategy,
};

const SUPPORTED_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileFile {
    pub version: u32,
    pub name: String,
    #[serde(default)]
    pub identity: IdentityOptions,
    pub layout: SheetLayout,
    pub rules: Vec<RuleSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleSpec {
    pub field: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub scope: Scope,
    pub pattern: Option<String>,
    pub template: Option<String>,
    pub section: Option<SectionSpec>,
    pub collect: Option<CollectSpec>,
    pub custom: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SectionSpec {
    pub start: String,
    #[serde(default)]
    pub end: Vec<String>,
}

fn default_group() -> usize {
    1
}

fn default_separator() -> String {
    ", ".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CollectSpec {
    pub item: String,
    #[serde(default = "default_group")]
    pub group: usize,
    #[serde(default)]
    pub unique: bool,
    pub limit: Option<usize>,
    #[serde(default = "default_separator")]
    pub separator: String,
    #[serde(default)]
    pub lowercase: bool,
}

/// Text between the end of `start` and the earliest following `end` match.
#[derive(Debug, Clone)]
pub struct Section {
    start: Regex,
    end: Vec<Regex>,
}

impl Section {
    fn compile(field: &str, spec: &SectionSpec) -> Result<Self, RuleError> {
        Ok(Self {
            start: compile(field, &spec.start)?,
            end: spec
                .end
                .iter()
                .map(|p| compile(field, p))
                .collect::<Result<_, _>>()?,
        })
    }

    pub fn slice<'a>(&self, text: &'a str) -> Option<&'a str> {
        let start = self.start.find(text)?;
        let rest = &text[start.end()..];
        let end = self
            .end
            .iter()
            .filter_map(|re| re.find(rest).map(|m| m.start()))
            .min()
            .unwrap_or(rest.len());
        Some(&rest[..end])
    }
}

#[derive(Debug, Clone)]
struct Collect {
    item: Regex,
    group: usize,
    unique: bool,
    limit: Option<usize>,
    separator: String,
    lowercase: bool,
}

impl Collect {
    fn run(&self, haystack: &str) -> Option<String> {
        let mut items: Vec<String> = Vec::new();
        for caps in self.item.captures_iter(haystack) {
            let Some(m) = caps.get(self.group) else {
                continue;
            };
            let mut item = m.as_str().trim().to_string();
            if item.is_empty() {
                continue;
            }
            if self.lowercase {
                item = item.to_lowercase();
            }
            if self.unique && items.contains(&item) {
                continue;
            }
            items.push(item);
        }
        if let Some(limit) = self.limit {
            items.truncate(limit);
        }
        (!items.is_empty()).then(|| items.join(&self.separator))
    }
}

fn scoped<'a>(scope: Scope, content: &'a str, filename: &'a str) -> &'a str {
    match scope {
        Scope::Content => content,
        Scope::Filename => filename,
    }
}

impl RuleSpec {
    fn families(&self) -> usize {
        let explicit = [
            self.pattern.is_some(),
            self.collect.is_some(),
            self.custom.is_some(),
        ]
        .into_iter()
        .filter(|present| *present)
        .count();
        if explicit == 0 && self.section.is_some() {
            1
        } else {
            explicit
        }
    }

    fn invalid(&self, message: impl Into<String>) -> RuleError {
        RuleError::Invalid {
            field: self.field.clone(),
            message: message.into(),
        }
    }

    /// Turns one declarative rule into an engine rule.
    pub fn compile(&self) -> Result<ExtractionRule, RuleError> {
        let found = self.families();
        if found != 1 {
            return Err(RuleError::StrategyCount {
                field: self.field.clone(),
                found,
            });
        }
        if self.template.is_some() && self.pattern.is_none() {
            return Err(self.invalid("`template` requires `pattern`"));
        }

        let field = self.field.as_str();
        let scope = self.scope;
        let section = self
            .section
            .as_ref()
            .map(|spec| Section::compile(field, spec))
            .transpose()?;

        let (name, func): (String, CustomFn) = if let Some(name) = &self.custom {
            if section.is_some() {
                return Err(self.invalid("`custom` cannot be combined with `section`"));
            }
            let func = builtin(name).ok_or_else(|| RuleError::UnknownCustom {
                field: self.field.clone(),
                name: name.clone(),
            })?;
            (name.clone(), func)
        } else if let Some(spec) = &self.collect {
            let collect = Collect {
                item: compile(field, &spec.item)?,
                group: spec.group,
                unique: spec.unique,
                limit: spec.limit,
                separator: spec.separator.clone(),
                lowercase: spec.lowercase,
            };
            require_group(field, &collect.item, collect.group)?;
            let func: CustomFn = Arc::new(move |content: &str, filename: &str| {
                let text = scoped(scope, content, filename);
                match &section {
                    Some(section) => collect.run(section.slice(text)?),
                    None => collect.run(text),
                }
            });
            ("collect".to_string(), func)
        } else if let Some(pattern) = &self.pattern {
            let regex = compile(field, pattern)?;
            match (&self.template, section) {
                (None, None) => {
                    require_group(field, &regex, 1)?;
                    return Ok(ExtractionRule {
                        field: self.field.clone(),
                        strategy: Strategy::Pattern { regex, scope },
                        required: self.required,
                    });
                }
                (Some(template), section) => {
                    let template = template.clone();
                    let func: CustomFn = Arc::new(move |content: &str, filename: &str| {
                        let text = scoped(scope, content, filename);
                        let text = match &section {
                            Some(section) => section.slice(text)?,
                            None => text,
                        };
                        let caps = regex.captures(text)?;
                        let mut out = String::new();
                        caps.expand(&template, &mut out);
                        Some(out)
                    });
                    ("template".to_string(), func)
                }
                (None, Some(section)) => {
                    require_group(field, &regex, 1)?;
                    let func: CustomFn = Arc::new(move |content: &str, filename: &str| {
                        let text = section.slice(scoped(scope, content, filename))?;
                        regex
                            .captures(text)
                            .and_then(|caps| caps.get(1))
                            .map(|m| m.as_str().to_string())
                    });
                    ("section".to_string(), func)
                }
            }
        } else {
            let section = section.ok_or_else(|| self.invalid("no strategy declared"))?;
            let func: CustomFn = Arc::new(move |content: &str, filename: &str| {
                section
                    .slice(scoped(scope, content, filename))
                    .map(str::to_string)
            });
            ("section".to_string(), func)
        };

        Ok(ExtractionRule {
            field: self.field.clone(),
            strategy: Strategy::Custom { name, scope, func },
            required: self.required,
        })
    }
}

/// Rule set, identity options and sheet layout for one report platform.
#[derive(Debug, Clone)]
pub struct Profile {
    pub name: String,
    pub version: u32,
    pub rule_set: RuleSet,
    pub layout: SheetLayout,
}

impl Profile {
    pub fn compile(file: ProfileFile) -> Result<Self, RuleError> {
        if file.version != SUPPORTED_VERSION {
            return Err(RuleError::Version(file.version));
        }
        let rules = file
            .rules
            .iter()
            .map(RuleSpec::compile)
            .collect::<Result<Vec<_>, _>>()?;
        let rule_set = RuleSet::new(file.name.clone(), rules)?.with_identity(file.identity);
        file.layout.validate(rule_set.len())?;
        Ok(Self {
            name: file.name,
            version: file.version,
            rule_set,
            layout: file.layout,
        })
    }

    pub fn from_yaml_str(source: &str) -> Result<Self, RuleError> {
        let file: ProfileFile = serde_yaml::from_str(source)?;
        Self::compile(file)
    }
}

pub fn load_profile(path: &Path) -> Result<Profile> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("reading profile {}", path.display()))?;
    Profile::from_yaml_str(&raw).with_context(|| format!("parsing profile {}", path.display()))
}

/// Accepts a profile name (`linux`) looked up under `profiles_dir`, or a path to a YAML file.
pub fn resolve_profile(name_or_path: &str, profiles_dir: &Path) -> Result<Profile> {
    let direct = PathBuf::from(name_or_path);
    let path = if direct.extension().is_some() || direct.components().count() > 1 {
        direct
    } else {
        profiles_dir.join(format!("{name_or_path}.yaml"))
    };
    load_profile(&path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract;
    use invrec_core::{Column, EntityKind};

    fn workspace_root() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("../..")
            .canonicalize()
            .expect("workspace root")
    }

    fn rule(yaml: &str) -> Result<ExtractionRule, RuleError> {
        let spec: RuleSpec = serde_yaml::from_str(yaml).expect("rule yaml");
        spec.compile()
    }

    fn apply(rule: &ExtractionRule, content: &str) -> Option<String> {
        let set = RuleSet::new("t", vec![rule.clone()]).expect("set");
        extract(&set, content, "f.txt")
            .expect("extract")
            .value(&rule.field)
            .expect("declared")
            .map(String::from)
    }

    #[test]
    fn template_expands_capture_groups() {
        let r = rule(
            r#"
field: Memori
pattern: 'Mem:\s+([\d.]+[GMK]i?)\s+([\d.]+[GMK]i?)'
template: "TOTAL ${1}, USED ${2}"
"#,
        )
        .expect("compile");
        assert_eq!(
            apply(&r, "              total        used\nMem:           31Gi        12Gi\n").as_deref(),
            Some("TOTAL 31Gi, USED 12Gi")
        );
        assert_eq!(apply(&r, "nothing"), None);
    }

    #[test]
    fn section_alone_yields_trimmed_body() {
        let r = rule(
            r#"
field: Konfigurasi RAID
section:
  start: 'RAID Configuration:'
  end: ['\n[A-Z][^\n]*:', '====================']
"#,
        )
        .expect("compile");
        let content = "RAID Configuration:\n  md0 : active raid1 sda1 sdb1\n\nKernel Version: 5.15\n";
        assert_eq!(
            apply(&r, content).as_deref(),
            Some("md0 : active raid1 sda1 sdb1")
        );
    }

    #[test]
    fn collect_dedupes_lowercases_and_limits_within_section() {
        let r = rule(
            r#"
field: Tipe
section:
  start: 'Disk Model and Capacity:'
  end: ['\n\s*\n']
collect:
  item: '(?i)\s(\b(?:disk|rom|lvm|part)\b)'
  unique: true
  lowercase: true
  limit: 2
"#,
        )
        .expect("compile");
        let content = "disk outside\nDisk Model and Capacity:\nsda 1T DISK\nsda1 1G part\nsr0 1G rom\n\nsdb 2T lvm\n";
        assert_eq!(apply(&r, content).as_deref(), Some("disk, part"));
    }

    #[test]
    fn filename_scope_reads_only_the_name() {
        let r = rule(
            r#"
field: U Slot Number
scope: filename
pattern: '(?i)u[._-]?(\d+(?:-\d+)?)'
"#,
        )
        .expect("compile");
        let set = RuleSet::new("t", vec![r]).expect("set");
        let record = extract(&set, "u99", "dir/x_u22-23.txt").expect("extract");
        assert_eq!(record.value("U Slot Number").unwrap(), Some("22-23"));
    }

    #[test]
    fn strategy_families_are_exclusive() {
        let both = rule("field: X\npattern: '(a)'\ncustom: unavailable\n");
        assert!(matches!(both, Err(RuleError::StrategyCount { found: 2, .. })));
        let none = rule("field: X\nrequired: true\n");
        assert!(matches!(none, Err(RuleError::StrategyCount { found: 0, .. })));
        let dangling = rule("field: X\ntemplate: '$1'\ncustom: unavailable\n");
        assert!(matches!(dangling, Err(RuleError::Invalid { .. })));
        let unknown = rule("field: X\ncustom: linux.fortune\n");
        assert!(matches!(unknown, Err(RuleError::UnknownCustom { .. })));
        let bad_group = rule("field: X\ncollect:\n  item: '(a)'\n  group: 2\n");
        assert!(matches!(bad_group, Err(RuleError::Invalid { .. })));
    }

    #[test]
    fn layout_width_must_cover_declared_fields() {
        let yaml = r#"
version: 1
name: tiny
layout:
  serial_column: L
  rack_column: E
  slot_column: F
  write_blocks:
    - { start: S, end: T }
rules:
  - field: Only
    pattern: '(x)'
"#;
        let err = Profile::from_yaml_str(yaml).unwrap_err();
        assert!(matches!(err, RuleError::Layout(_)), "{err}");
        assert!(matches!(
            Profile::from_yaml_str(&yaml.replace("version: 1", "version: 2")),
            Err(RuleError::Version(2))
        ));
    }

    #[test]
    fn shipped_profiles_compile_with_matching_layouts() {
        let root = workspace_root();
        let linux = resolve_profile("linux", &root.join("profiles")).expect("linux profile");
        assert_eq!(linux.rule_set.len(), 27);
        assert_eq!(linux.layout.serial_column, Column(11));
        assert_eq!(linux.layout.address_column, Some(Column(37)));

        let windows =
            load_profile(&root.join("profiles/windows.yaml")).expect("windows profile");
        assert_eq!(windows.rule_set.len(), 27);
        assert!(windows.rule_set.identity().detect_hypervisor);
        assert_eq!(windows.layout.serial_column, Column(9));

        let linux_fields: Vec<_> = linux.rule_set.schema().fields().to_vec();
        assert_eq!(linux_fields, windows.rule_set.schema().fields().to_vec());
    }

    #[test]
    fn linux_fixture_extracts_expected_fields() {
        let root = workspace_root();
        let profile = resolve_profile("linux", &root.join("profiles")).expect("profile");
        let name = "sn.J8K2L9P_r5_u22_ty.svr_hn.db-prod-01.txt";
        let content = fs::read_to_string(root.join("fixtures/linux").join(name)).expect("fixture");
        let record = extract(&profile.rule_set, &content, name).expect("extract");

        let get = |f: &str| record.value(f).expect("declared field").map(String::from);
        assert_eq!(get("Rack Number").as_deref(), Some("5"));
        assert_eq!(get("U Slot Number").as_deref(), Some("22"));
        assert_eq!(
            get("Prosesor (CPU)").as_deref(),
            Some("Intel(R) Xeon(R) Silver 4214 CPU @ 2.20GHz")
        );
        assert_eq!(get("Penggunaan CPU (%)").as_deref(), Some("12.5"));
        assert_eq!(get("Memori").as_deref(), Some("TOTAL 62Gi, USED 18Gi"));
        assert_eq!(get("Penggunaan Memori (%)").as_deref(), Some("29.03"));
        assert_eq!(get("Tipe").as_deref(), Some("disk, part, rom"));
        assert_eq!(get("Model").as_deref(), Some("PERC H730P Mini, DVD-ROM DV-28SW"));
        assert_eq!(get("Kapasitas Disk").as_deref(), Some("1.1T"));
        assert_eq!(get("Konfigurasi RAID").as_deref(), Some("No software RAID detected"));
        assert_eq!(
            get("Partisi").as_deref(),
            Some(
                "sda (PERC H730P Mini, 1.1T, disk); sda1 (1G, part, /boot); \
                 sda2 (1.1T, part, /); sr0 (DVD-ROM DV-28SW, 1024M, rom)"
            )
        );
        assert_eq!(get("Nama dan Versi OS").as_deref(), Some("Ubuntu 22.04.4 LTS"));
        assert_eq!(get("Hostname").as_deref(), Some("db-prod-01"));
        assert_eq!(get("Nama Interface").as_deref(), Some("lo, eno1, eno2"));
        assert_eq!(
            get("Alamat IP dan Subnet Mask").as_deref(),
            Some("127.0.0.1/8, 10.10.5.21/24")
        );
        assert_eq!(get("Interface Count").as_deref(), Some("3"));
        assert_eq!(get("IP Gateway").as_deref(), Some("10.10.5.1"));
        assert_eq!(get("IP DNS").as_deref(), Some("10.10.0.53, 10.10.0.54, 8.8.8.8"));
        assert_eq!(
            get("MAC Address").as_deref(),
            Some("b0:26:28:aa:01:10, b0:26:28:aa:01:11")
        );
        assert_eq!(
            get("Daftar Aplikasi Mayor & Versinya").as_deref(),
            Some("postgresql-14, nginx, openssh-server")
        );
        assert_eq!(
            get("Running Service").as_deref(),
            Some("nginx.service, postgresql@14-main.service, ssh.service")
        );
        assert_eq!(get("Port yang Terbuka").as_deref(), Some("22, 5432, 80"));

        let ids = record.identifiers();
        assert_eq!(ids.serial_number.as_deref(), Some("J8K2L9P"));
        assert_eq!(ids.entity_kind, EntityKind::Physical);
        assert_eq!(record.hostname(), Some("db-prod-01"));
    }

    #[test]
    fn windows_fixture_extracts_expected_fields() {
        let root = workspace_root();
        let profile = resolve_profile("windows", &root.join("profiles")).expect("profile");
        let name = "sn.NONE_r9_u30_ty.vm_s_10.10.5.21_hn.win-app-02.txt";
        let content =
            fs::read_to_string(root.join("fixtures/windows").join(name)).expect("fixture");
        let record = extract(&profile.rule_set, &content, name).expect("extract");

        let get = |f: &str| record.value(f).expect("declared field").map(String::from);
        assert_eq!(get("Penggunaan CPU (%)").as_deref(), Some("15.00%"));
        assert_eq!(get("Memori").as_deref(), Some("TOTAL 16.00GB, USED 12.00GB"));
        assert_eq!(get("Penggunaan Memori (%)").as_deref(), Some("75.00%"));
        assert_eq!(get("Tipe").as_deref(), Some("SCSI, Fixed Disk"));
        assert_eq!(get("Model").as_deref(), Some("VMware Virtual disk SCSI Disk Device"));
        assert_eq!(get("Kapasitas Disk").as_deref(), Some("100.00GB"));
        assert_eq!(
            get("Partisi").as_deref(),
            Some("C: (99.46GB, Free: 41.25GB, NTFS)")
        );
        assert_eq!(
            get("Nama dan Versi OS").as_deref(),
            Some("Microsoft Windows Server 2019 Standard (10.0.17763)")
        );
        assert_eq!(get("Versi Kernel/Build (Potensi Kerentanan)").as_deref(), Some("17763"));
        assert_eq!(get("Architecture").as_deref(), Some("64-bit"));
        assert_eq!(get("Hostname").as_deref(), Some("WIN-APP-02"));
        assert_eq!(get("Nama Interface").as_deref(), Some("vmxnet3 Ethernet Adapter"));
        assert_eq!(
            get("Alamat IP dan Subnet Mask").as_deref(),
            Some("10.10.7.40/255.255.255.0")
        );
        assert_eq!(get("Interface Count").as_deref(), Some("1"));
        assert_eq!(get("IP DNS").as_deref(), Some("10.10.0.53, 10.10.0.54"));
        assert_eq!(
            get("Daftar Aplikasi Mayor & Versinya").as_deref(),
            Some("VMware Tools (12.1.5.20735119), 7-Zip 22.01 (x64) (22.01)")
        );
        assert_eq!(get("Running Service"), None);
        assert_eq!(get("Port yang Terbuka"), None);

        let ids = record.identifiers();
        assert_eq!(ids.serial_number, None);
        assert_eq!(ids.rack_number.as_deref(), Some("9"));
        assert_eq!(ids.slot_number.as_deref(), Some("30"));
        assert_eq!(ids.entity_kind, EntityKind::Virtual);
        assert_eq!(ids.parent_address.as_deref(), Some("10.10.5.21"));
        assert_eq!(record.hostname(), Some("win-app-02"));
    }
}
