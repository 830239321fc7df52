//! Named custom extractors that profiles reference with `custom: <name>`.
//!
//! Every extractor is pure: it reads `(content, filename)` and returns `None`
//! when nothing usable is found.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use regex::Regex;

use crate::CustomFn;

macro_rules! re {
    ($re:literal) => {{
        static RE: LazyLock<Regex> =
            LazyLock::new(|| Regex::new($re).expect("builtin pattern compiles"));
        &*RE
    }};
}

pub const BUILTIN_NAMES: &[&str] = &[
    "unavailable",
    "linux.partitions",
    "linux.dns_servers",
    "windows.cpu_load",
    "windows.memory",
    "windows.memory_usage",
    "windows.disk_types",
    "windows.disk_models",
    "windows.disk_capacity",
    "windows.raid",
    "windows.partitions",
    "windows.disk_usage",
    "windows.os_name",
    "windows.interfaces",
    "windows.addresses",
    "windows.interface_count",
    "windows.gateway",
    "windows.dns_servers",
    "windows.mac_addresses",
    "windows.products",
];

pub fn builtin(name: &str) -> Option<CustomFn> {
    let func: fn(&str) -> Option<String> = match name {
        "unavailable" => unavailable,
        "linux.partitions" => linux_partitions,
        "linux.dns_servers" => linux_dns_servers,
        "windows.cpu_load" => windows_cpu_load,
        "windows.memory" => windows_memory,
        "windows.memory_usage" => windows_memory_usage,
        "windows.disk_types" => windows_disk_types,
        "windows.disk_models" => windows_disk_models,
        "windows.disk_capacity" => windows_disk_capacity,
        "windows.raid" => windows_raid,
        "windows.partitions" => windows_partitions,
        "windows.disk_usage" => windows_disk_usage,
        "windows.os_name" => windows_os_name,
        "windows.interfaces" => windows_interfaces,
        "windows.addresses" => windows_addresses,
        "windows.interface_count" => windows_interface_count,
        "windows.gateway" => windows_gateway,
        "windows.dns_servers" => windows_dns_servers,
        "windows.mac_addresses" => windows_mac_addresses,
        "windows.products" => windows_products,
        _ => return None,
    };
    let wrapped: CustomFn = Arc::new(move |content: &str, _filename: &str| func(content));
    Some(wrapped)
}

fn unavailable(_content: &str) -> Option<String> {
    None
}

/// Insertion-ordered set used to de-duplicate scanned items.
#[derive(Debug, Default)]
struct Ordered(Vec<String>);

impl Ordered {
    fn push(&mut self, item: impl Into<String>) {
        let item = item.into();
        if !item.is_empty() && !self.0.contains(&item) {
            self.0.push(item);
        }
    }

    fn join(self, limit: Option<usize>, separator: &str) -> Option<String> {
        let items: Vec<String> = match limit {
            Some(n) => self.0.into_iter().take(n).collect(),
            None => self.0,
        };
        (!items.is_empty()).then(|| items.join(separator))
    }
}

fn first<'a>(re: &Regex, haystack: &'a str) -> Option<&'a str> {
    re.captures(haystack)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim())
        .filter(|v| !v.is_empty())
}

fn braced_list(inner: &str) -> impl Iterator<Item = &str> {
    inner.split(',').map(str::trim).filter(|v| !v.is_empty())
}

fn gib(bytes: f64) -> f64 {
    bytes / 1024.0 / 1024.0 / 1024.0
}

// ---------------------------------------------------------------- linux ----

fn lsblk_section(content: &str) -> Option<&str> {
    let start = re!(r"Disk Model and Capacity:").find(content)?;
    let rest = &content[start.end()..];
    let end = [re!(r"\n\s*\n"), re!(r"====================")]
        .into_iter()
        .filter_map(|re| re.find(rest).map(|m| m.start()))
        .min()
        .unwrap_or(rest.len());
    Some(&rest[..end])
}

fn linux_partitions(content: &str) -> Option<String> {
    let section = lsblk_section(content)?;
    let kinds = re!(r"(?i)^(disk|part|rom|lvm)$");
    let mut entries = Vec::new();

    for line in section.lines().map(str::trim) {
        if !re!(r"(?i)^(?:[├└─]*\s*)?(sd|nvme|vd|sr)\w*").is_match(line)
            || !re!(r"(?i)(disk|part|rom|lvm)").is_match(line)
        {
            continue;
        }
        let clean = line.replace(['├', '└', '─', '│'], " ");
        let parts: Vec<&str> = clean.split_whitespace().collect();
        let Some((&name, tail)) = parts.split_first() else {
            continue;
        };
        let Some(type_at) = tail.iter().rposition(|p| kinds.is_match(p)) else {
            continue;
        };

        let mut details = Vec::new();
        if type_at >= 1 {
            let model = tail[..type_at - 1].join(" ");
            if !model.is_empty() {
                details.push(model);
            }
            details.push(tail[type_at - 1].to_string());
        }
        details.push(tail[type_at].to_ascii_lowercase());
        if let Some(mount) = tail.get(type_at + 1).filter(|m| m.starts_with('/')) {
            details.push(mount.to_string());
        }
        entries.push(format!("{name} ({})", details.join(", ")));
    }

    (!entries.is_empty()).then(|| entries.join("; "))
}

/// Body of a `--- header ---` block, up to the next `---` line.
fn dashed_blocks<'a>(content: &'a str, header: &Regex) -> Vec<&'a str> {
    header
        .find_iter(content)
        .map(|m| {
            let rest = &content[m.end()..];
            let end = rest.find("\n---").unwrap_or(rest.len());
            &rest[..end]
        })
        .collect()
}

fn is_dns_address(candidate: &str) -> bool {
    re!(r"^([0-9]{1,3}\.){3}[0-9]{1,3}$").is_match(candidate)
        || re!(r"^([0-9a-fA-F]{0,4}:){2,7}[0-9a-fA-F]{0,4}$").is_match(candidate)
}

fn linux_dns_servers(content: &str) -> Option<String> {
    let mut found = Ordered::default();
    let token = re!(r"[0-9a-fA-F:.]+");

    if let Some(m) = re!(r"DNS Servers \(from [^)]+\):\n").find(content) {
        let rest = &content[m.end()..];
        let end = [rest.find("\n\n"), rest.find("DNS Configuration")]
            .into_iter()
            .flatten()
            .min()
            .unwrap_or(rest.len());
        for line in rest[..end].lines() {
            for ip in token.find_iter(line) {
                found.push(ip.as_str());
            }
        }
    }

    for block in dashed_blocks(content, re!(r"--- /etc/resolv\.conf ---\n")) {
        for caps in re!(r"nameserver\s+([0-9a-fA-F:.]+)").captures_iter(block) {
            found.push(&caps[1]);
        }
    }
    for block in dashed_blocks(content, re!(r"--- systemd-resolved[^\n]*---\n")) {
        for caps in re!(r"(?i)DNS Servers?:\s*([0-9a-fA-F:.\s]+)").captures_iter(block) {
            caps[1]
                .split_whitespace()
                .filter(|ip| token.find(ip).is_some_and(|m| m.len() == ip.len()))
                .for_each(|ip| found.push(ip));
        }
    }
    for block in dashed_blocks(content, re!(r"--- NetworkManager[^\n]*---\n")) {
        for caps in re!(r"IP[46]\.DNS\[\d+\]:\s*([0-9a-fA-F:.]+)").captures_iter(block) {
            found.push(&caps[1]);
        }
    }
    for block in dashed_blocks(content, re!(r"--- DHCP leases[^\n]*---\n")) {
        for caps in re!(r"domain-name-servers\s+([0-9a-fA-F:.,\s]+);").captures_iter(block) {
            caps[1]
                .split(|c: char| c == ',' || c.is_whitespace())
                .map(str::trim)
                .for_each(|ip| found.push(ip));
        }
    }
    for block in dashed_blocks(content, re!(r"--- /etc/netplan/ ---\n")) {
        for caps in re!(r"addresses:\s*\[([^\]]*)\]").captures_iter(block) {
            for ip in token.find_iter(&caps[1]) {
                found.push(ip.as_str());
            }
        }
        for caps in re!(r"(?m)^\s*-\s*([0-9a-fA-F:.]+)").captures_iter(block) {
            found.push(&caps[1]);
        }
    }
    for block in dashed_blocks(content, re!(r"--- /etc/network/interfaces ---\n")) {
        for caps in re!(r"dns-nameservers\s+([0-9a-fA-F:. \t]+)").captures_iter(block) {
            caps[1].split_whitespace().for_each(|ip| found.push(ip));
        }
    }
    for block in dashed_blocks(content, re!(r"--- /etc/sysconfig/network-scripts/ ---\n")) {
        for caps in re!(r#"DNS\d*=["']?([0-9a-fA-F:.]+)["']?"#).captures_iter(block) {
            found.push(&caps[1]);
        }
    }

    found.0.retain(|ip| is_dns_address(ip));
    found.join(None, ", ")
}

// -------------------------------------------------------------- windows ----

/// Text of a numbered report section (`6. PHYSICAL DISKS`) up to the next numbered header.
fn numbered_section<'a>(content: &'a str, header: &Regex, next: &Regex) -> Option<&'a str> {
    let start = header.find(content)?;
    let rest = &content[start.end()..];
    let end = next.find(rest).map(|m| m.start()).unwrap_or(rest.len());
    Some(&rest[..end])
}

/// `Key : Value` lines grouped into blank-line separated property blocks.
fn property_blocks(section: &str) -> Vec<HashMap<String, String>> {
    let mut blocks = Vec::new();
    let mut current = HashMap::new();
    for line in section.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                blocks.push(std::mem::take(&mut current));
            }
            continue;
        }
        if let Some((key, value)) = line.split_once(':') {
            let key = key.trim();
            if !key.is_empty() && !key.contains(' ') {
                current
                    .entry(key.to_string())
                    .or_insert_with(|| value.trim().to_string());
            }
        }
    }
    if !current.is_empty() {
        blocks.push(current);
    }
    blocks
}

fn physical_disks(content: &str) -> Option<&str> {
    numbered_section(content, re!(r"6\. PHYSICAL DISKS"), re!(r"(?m)^\s*7\."))
}

fn logical_disks(content: &str) -> Option<&str> {
    numbered_section(content, re!(r"7\. LOGICAL DISKS"), re!(r"(?m)^\s*8\."))
}

fn network_adapters(content: &str) -> Option<&str> {
    numbered_section(content, re!(r"9\. NETWORK ADAPTERS"), re!(r"(?m)^\s*10\."))
}

fn installed_products(content: &str) -> Option<&str> {
    numbered_section(content, re!(r"18\. INSTALLED PRODUCTS"), re!(r"(?m)^\s*19\."))
}

fn windows_cpu_load(content: &str) -> Option<String> {
    let loads: Vec<f64> = re!(r"LoadPercentage\s*:\s*(\d+)")
        .captures_iter(content)
        .filter_map(|c| c[1].parse().ok())
        .collect();
    if loads.is_empty() {
        return None;
    }
    let avg = loads.iter().sum::<f64>() / loads.len() as f64;
    Some(format!("{avg:.2}%"))
}

fn memory_counters(content: &str) -> Option<(f64, f64)> {
    let total: f64 = first(re!(r"TotalPhysicalMemory\s*:\s*(\d+)"), content)?
        .parse()
        .ok()?;
    let free: f64 = first(re!(r"FreePhysicalMemory\s*:\s*(\d+)"), content)?
        .parse()
        .ok()?;
    Some((total, free))
}

fn windows_memory(content: &str) -> Option<String> {
    let (total, free) = memory_counters(content)?;
    let total_gb = total / 1024.0 / 1024.0;
    let used_gb = (total - free) / 1024.0 / 1024.0;
    Some(format!("TOTAL {total_gb:.2}GB, USED {used_gb:.2}GB"))
}

fn windows_memory_usage(content: &str) -> Option<String> {
    let (total, free) = memory_counters(content)?;
    if total <= 0.0 {
        return None;
    }
    Some(format!("{:.2}%", (total - free) / total * 100.0))
}

fn windows_disk_types(content: &str) -> Option<String> {
    let mut types = Ordered::default();
    for (needle, label) in [
        ("SCSI", "SCSI"),
        ("USB", "USB"),
        ("Fixed hard disk", "Fixed Disk"),
        ("Removable Media", "Removable"),
    ] {
        if content.contains(needle) {
            types.push(label);
        }
    }
    types.join(None, ", ")
}

fn windows_disk_models(content: &str) -> Option<String> {
    let mut models = Ordered::default();
    for caps in re!(r"Model\s*:\s*([^\r\n]+)").captures_iter(physical_disks(content)?) {
        models.push(caps[1].trim());
    }
    models.join(None, ", ")
}

fn windows_disk_capacity(content: &str) -> Option<String> {
    let scope = physical_disks(content).unwrap_or(content);
    let sizes: Vec<f64> = re!(r"Size\s*:\s*(\d+)")
        .captures_iter(scope)
        .filter_map(|c| c[1].parse().ok())
        .collect();
    if sizes.is_empty() {
        return None;
    }
    Some(format!("{:.2}GB", gib(sizes.iter().sum())))
}

fn windows_raid(content: &str) -> Option<String> {
    if !content.contains("PERC") && !content.contains("RAID") {
        return None;
    }
    Some(
        re!(r"(?:PERC|RAID)[^\r\n]*")
            .find(content)
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_else(|| "RAID Detected".to_string()),
    )
}

fn logical_volumes(content: &str) -> Vec<HashMap<String, String>> {
    logical_disks(content)
        .map(property_blocks)
        .unwrap_or_default()
}

fn windows_partitions(content: &str) -> Option<String> {
    let entries: Vec<String> = logical_volumes(content)
        .iter()
        .filter_map(|block| {
            let drive = block.get("DeviceID")?;
            let size: f64 = block.get("Size")?.parse().ok()?;
            let free: f64 = block.get("FreeSpace")?.parse().ok()?;
            let fs = block.get("FileSystem").map(String::as_str).unwrap_or("");
            Some(format!(
                "{drive} ({:.2}GB, Free: {:.2}GB, {fs})",
                gib(size),
                gib(free)
            ))
        })
        .collect();
    (!entries.is_empty()).then(|| entries.join("; "))
}

fn windows_disk_usage(content: &str) -> Option<String> {
    let (size, used) = logical_volumes(content)
        .iter()
        .filter_map(|block| {
            let size: f64 = block.get("Size")?.parse().ok()?;
            let free: f64 = block.get("FreeSpace")?.parse().ok()?;
            Some((size, size - free))
        })
        .fold((0.0, 0.0), |(s, u), (size, used)| (s + size, u + used));
    if size <= 0.0 {
        return None;
    }
    Some(format!("{:.2}%", used / size * 100.0))
}

fn windows_os_name(content: &str) -> Option<String> {
    let blocks = property_blocks(content);
    let block = blocks.iter().find(|b| {
        b.get("Caption")
            .is_some_and(|c| c.starts_with("Microsoft Windows"))
    })?;
    let caption = block.get("Caption")?;
    match block.get("Version").filter(|v| !v.is_empty()) {
        Some(version) => Some(format!("{caption} ({version})")),
        None => Some(caption.clone()),
    }
}

fn windows_interfaces(content: &str) -> Option<String> {
    let mut names = Ordered::default();
    for caps in re!(r"Name\s*:\s*([^\r\n]+)").captures_iter(network_adapters(content)?) {
        let name = caps[1].trim();
        if !name.contains("Miniport") && !name.contains("Kernel") {
            names.push(name);
        }
    }
    names.join(None, ", ")
}

fn windows_addresses(content: &str) -> Option<String> {
    let mut ips = Ordered::default();
    for caps in re!(r"IPAddress\s*:\s*\{([^}]+)\}").captures_iter(content) {
        braced_list(&caps[1])
            .filter(|ip| !ip.starts_with("fe80") && *ip != "::1")
            .for_each(|ip| ips.push(ip));
    }
    let subnets: Vec<&str> = re!(r"IPSubnet\s*:\s*\{([^}]+)\}")
        .captures_iter(content)
        .flat_map(|c| {
            braced_list(c.get(1).map_or("", |m| m.as_str()))
                .collect::<Vec<_>>()
        })
        .collect();

    let joined: Vec<String> = ips
        .0
        .iter()
        .enumerate()
        .map(|(i, ip)| match subnets.get(i) {
            Some(mask) => format!("{ip}/{mask}"),
            None => ip.clone(),
        })
        .collect();
    (!joined.is_empty()).then(|| joined.join(", "))
}

fn windows_interface_count(content: &str) -> Option<String> {
    let section = network_adapters(content)?;
    Some(
        re!(r"NetConnectionStatus\s*:")
            .find_iter(section)
            .count()
            .to_string(),
    )
}

fn windows_gateway(content: &str) -> Option<String> {
    first(re!(r"DefaultIPGateway\s*:\s*\{([^}]+)\}"), content).map(String::from)
}

fn windows_dns_servers(content: &str) -> Option<String> {
    let mut servers = Ordered::default();
    for caps in re!(r"DNSServerSearchOrder\s*:\s*\{([^}]+)\}").captures_iter(content) {
        braced_list(&caps[1]).for_each(|dns| servers.push(dns));
    }
    servers.join(None, ", ")
}

fn windows_mac_addresses(content: &str) -> Option<String> {
    let mut macs = Ordered::default();
    for caps in re!(r"(?i)MACAddress\s*:\s*([A-F0-9:-]+)").captures_iter(content) {
        let mac = caps[1].trim();
        if mac != "00:00:00:00:00:00" {
            macs.push(mac);
        }
    }
    macs.join(Some(3), ", ")
}

fn windows_products(content: &str) -> Option<String> {
    let mut apps = Ordered::default();
    for block in property_blocks(installed_products(content)?) {
        let (Some(name), Some(version)) = (block.get("Name"), block.get("Version")) else {
            continue;
        };
        if name.is_empty()
            || name.contains("Minimum Runtime")
            || name.contains("Additional Runtime")
        {
            continue;
        }
        apps.push(format!("{name} ({version})"));
    }
    apps.join(Some(8), ", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(name: &str, content: &str) -> Option<String> {
        let func = builtin(name).expect("registered builtin");
        func(content, "report.txt")
    }

    #[test]
    fn every_listed_name_is_registered() {
        for name in BUILTIN_NAMES {
            assert!(builtin(name).is_some(), "{name} missing");
        }
        assert!(builtin("linux.nope").is_none());
        assert_eq!(run("unavailable", "anything"), None);
    }

    #[test]
    fn lsblk_tree_is_summarised_per_device() {
        let content = "\
Disk Model and Capacity:
NAME        MODEL              SIZE TYPE MOUNTPOINT
sda         PERC H730 Mini   558.4G disk
├─sda1                           1G part /boot
└─sda2                       557.4G part
sr0         Virtual CDROM     1024M rom

Next Section:
";
        assert_eq!(
            run("linux.partitions", content).as_deref(),
            Some(
                "sda (PERC H730 Mini, 558.4G, disk); sda1 (1G, part, /boot); \
                 sda2 (557.4G, part); sr0 (Virtual CDROM, 1024M, rom)"
            )
        );
        assert_eq!(run("linux.partitions", "no disks here"), None);
    }

    #[test]
    fn dns_servers_merge_sources_in_first_seen_order() {
        let content = "\
DNS Servers (from resolvectl):
  10.0.0.2
  10.0.0.3

--- /etc/resolv.conf ---
nameserver 10.0.0.2
nameserver 1.1.1.1
--- NetworkManager (nmcli) ---
IP4.DNS[1]: 8.8.8.8
IP6.DNS[1]: 2001:4860:4860::8888
--- /etc/sysconfig/network-scripts/ ---
DNS1=\"9.9.9.9\"
--- end ---
";
        assert_eq!(
            run("linux.dns_servers", content).as_deref(),
            Some("10.0.0.2, 10.0.0.3, 1.1.1.1, 8.8.8.8, 2001:4860:4860::8888, 9.9.9.9")
        );
        assert_eq!(run("linux.dns_servers", "nameserver 1.1.1.1"), None);
    }

    #[test]
    fn windows_memory_figures_use_kilobyte_counters() {
        let content = "TotalPhysicalMemory : 16777216\nFreePhysicalMemory : 4194304\n";
        assert_eq!(
            run("windows.memory", content).as_deref(),
            Some("TOTAL 16.00GB, USED 12.00GB")
        );
        assert_eq!(run("windows.memory_usage", content).as_deref(), Some("75.00%"));
        assert_eq!(run("windows.memory", "TotalPhysicalMemory : 1"), None);
    }

    #[test]
    fn windows_logical_disks_are_read_per_block() {
        let content = "\
7. LOGICAL DISKS
DeviceID   : C:
FileSystem : NTFS
FreeSpace  : 53687091200
Size       : 107374182400

DeviceID   : D:
FileSystem : NTFS
FreeSpace  : 107374182400
Size       : 214748364800

8. SERVICES
";
        assert_eq!(
            run("windows.partitions", content).as_deref(),
            Some("C: (100.00GB, Free: 50.00GB, NTFS); D: (200.00GB, Free: 100.00GB, NTFS)")
        );
        assert_eq!(run("windows.disk_usage", content).as_deref(), Some("50.00%"));
    }

    #[test]
    fn windows_addresses_pair_with_subnets_and_skip_link_local() {
        let content = "\
IPAddress : {192.168.10.5, fe80::1c2b:3a4d}
IPSubnet : {255.255.255.0, 64}
DefaultIPGateway : {192.168.10.1}
DNSServerSearchOrder : {192.168.10.2, 192.168.10.3}
MACAddress : 00:50:56:AB:CD:EF
MACAddress : 00:00:00:00:00:00
";
        assert_eq!(
            run("windows.addresses", content).as_deref(),
            Some("192.168.10.5/255.255.255.0")
        );
        assert_eq!(run("windows.gateway", content).as_deref(), Some("192.168.10.1"));
        assert_eq!(
            run("windows.dns_servers", content).as_deref(),
            Some("192.168.10.2, 192.168.10.3")
        );
        assert_eq!(
            run("windows.mac_addresses", content).as_deref(),
            Some("00:50:56:AB:CD:EF")
        );
    }

    #[test]
    fn windows_products_drop_runtime_noise_and_cap_at_eight() {
        let mut content = String::from("18. INSTALLED PRODUCTS\n");
        content.push_str("Name : Microsoft Visual C++ 2019 X64 Minimum Runtime\nVersion : 14.2\n\n");
        for i in 0..10 {
            content.push_str(&format!("Name : App{i}\nVersion : 1.{i}\n\n"));
        }
        content.push_str("19. HOTFIXES\nName : KB1\nVersion : 1\n");
        let out = run("windows.products", &content).expect("products");
        assert!(out.starts_with("App0 (1.0), App1 (1.1)"));
        assert_eq!(out.split(", ").count(), 8);
        assert!(!out.contains("Runtime"));
        assert!(!out.contains("KB1"));
    }
}
