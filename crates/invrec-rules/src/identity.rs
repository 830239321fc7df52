//! Canonical identifier derivation from report file names (content as fallback).

use std::sync::LazyLock;

use invrec_core::{range_head, EntityKind, Identifiers};
use regex::Regex;
use serde::{Deserialize, Serialize};

macro_rules! marker {
    ($re:literal) => {{
        static RE: LazyLock<Regex> =
            LazyLock::new(|| Regex::new($re).expect("identity marker compiles"));
        &*RE
    }};
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IdentityOptions {
    /// Look for serial/rack/slot/hostname labels in the report body when the name lacks them.
    pub content_fallback: bool,
    /// Classify unmarked reports as virtual when the body carries hypervisor hints.
    pub detect_hypervisor: bool,
    /// Serial values that stand for "no serial" and must never drive matching.
    pub placeholder_serials: Vec<String>,
}

impl Default for IdentityOptions {
    fn default() -> Self {
        Self {
            content_fallback: true,
            detect_hypervisor: false,
            placeholder_serials: ["NONE", "N/A", "NA", "-"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl IdentityOptions {
    fn is_placeholder(&self, serial: &str) -> bool {
        self.placeholder_serials
            .iter()
            .any(|p| p.eq_ignore_ascii_case(serial))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DerivedIdentity {
    pub identifiers: Identifiers,
    pub hostname: Option<String>,
}

/// Last path component, accepting both separator styles.
pub fn basename(name: &str) -> &str {
    name.rsplit(['/', '\\']).next().unwrap_or(name)
}

fn marker_stem(name: &str) -> &str {
    let base = basename(name);
    let lower = base.to_ascii_lowercase();
    if lower.ends_with(".txt") || lower.ends_with(".log") {
        &base[..base.len() - 4]
    } else {
        base
    }
}

fn capture<'a>(re: &Regex, haystack: &'a str) -> Option<&'a str> {
    re.captures(haystack)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .filter(|v| !v.is_empty())
}

/// Entity kind from the type marker alone.
pub fn classify_filename(name: &str) -> EntityKind {
    let stem = marker_stem(name);
    if let Some(kind) = capture(marker!(r"(?i)ty[._-](svr|vm)(?:[_-]|$)"), stem) {
        return if kind.eq_ignore_ascii_case("svr") {
            EntityKind::Physical
        } else {
            EntityKind::Virtual
        };
    }
    let lower = basename(name).to_ascii_lowercase();
    if lower.contains("ty.svr") {
        EntityKind::Physical
    } else if lower.contains("ty.vm") {
        EntityKind::Virtual
    } else {
        EntityKind::Unknown
    }
}

/// Captures the first match of `re` and returns it with the whole match cut
/// out of `haystack`, so later markers cannot be found inside that token.
fn cut(re: &Regex, haystack: &str) -> (Option<String>, String) {
    let Some(caps) = re.captures(haystack) else {
        return (None, haystack.to_string());
    };
    let value = caps
        .get(1)
        .map(|m| m.as_str().trim())
        .filter(|v| !v.is_empty())
        .map(String::from);
    let (start, end) = caps.get(0).map_or((0, 0), |m| (m.start(), m.end()));
    (value, format!("{}_{}", &haystack[..start], &haystack[end..]))
}

/// Identifiers carried by the file name only.
///
/// Markers may follow any non-alphanumeric separator. The hostname and serial
/// tokens are cut out first so their contents never read as rack or slot.
pub fn filename_identifiers(name: &str, options: &IdentityOptions) -> DerivedIdentity {
    let stem = marker_stem(name);
    let (hostname, rest) = cut(marker!(r"(?i)(?:^|[^A-Za-z0-9])hn[._-]([^_]+)"), stem);
    let (serial, rest) = cut(marker!(r"(?i)(?:^|[^A-Za-z0-9])sn[._-]([A-Za-z0-9-]+)"), &rest);
    let serial = serial.filter(|sn| !options.is_placeholder(sn));
    let rack = capture(marker!(r"(?i)(?:^|[^A-Za-z0-9])r[._-]?(\d+(?:-\d+)?)"), &rest)
        .map(|r| range_head(r).to_string());
    let slot = capture(marker!(r"(?i)(?:^|[^A-Za-z0-9])u[._-]?(\d+(?:-\d+)?)"), &rest)
        .map(|u| range_head(u).to_string());
    let entity_kind = classify_filename(name);
    let parent_address = capture(
        marker!(r"(?i)(?:svr|vm)[._-]s[._-](\d+\.\d+\.\d+\.\d+)"),
        &rest,
    )
    .map(String::from);

    DerivedIdentity {
        identifiers: Identifiers {
            serial_number: serial,
            rack_number: rack,
            slot_number: slot,
            entity_kind,
            parent_address,
        },
        hostname,
    }
}

fn has_hypervisor_hint(content: &str) -> bool {
    marker!(r"(?i)HypervisorPresent\s*:\s*True").is_match(content)
        || ["VMware", "Hyper-V", "VirtualBox"]
            .iter()
            .any(|hint| content.contains(hint))
}

/// Canonical identifier derivation, independent of the rule set that produced the record.
pub fn derive_identifiers(
    filename: &str,
    content: &str,
    options: &IdentityOptions,
) -> DerivedIdentity {
    let mut derived = filename_identifiers(filename, options);
    let ids = &mut derived.identifiers;

    if options.content_fallback {
        if ids.serial_number.is_none() {
            ids.serial_number = capture(
                marker!(r"(?im)^\s*Serial\s?Number\s*:\s*([^\r\n]+)"),
                content,
            )
            .filter(|sn| !options.is_placeholder(sn))
            .map(String::from);
        }
        if ids.rack_number.is_none() {
            ids.rack_number = capture(marker!(r"(?i)Rack\s*Number\s*:\s*(\d+(?:-\d+)?)"), content)
                .map(|r| range_head(r).to_string());
        }
        if ids.slot_number.is_none() {
            ids.slot_number = capture(
                marker!(r"(?i)U\s*Slot\s*Number\s*:\s*(\d+(?:-\d+)?)"),
                content,
            )
            .map(|u| range_head(u).to_string());
        }
        if derived.hostname.is_none() {
            derived.hostname = capture(
                marker!(r"(?:Hostname|CSName|DNSHostName)\s*:\s*([^\r\n]+)"),
                content,
            )
            .map(String::from);
        }
    }

    if options.detect_hypervisor
        && ids.entity_kind == EntityKind::Unknown
        && has_hypervisor_hint(content)
    {
        ids.entity_kind = EntityKind::Virtual;
    }

    derived
}
