//! Typed extraction of device state from the switch's HTML pages.
//!
//! The web interface has no API, so every read goes through the markers
//! below. Callers only ever see typed values or a [`ScrapeError`]; raw
//! markup never leaves this module.

use regex::{Captures, Regex};
use std::sync::LazyLock;
use std::time::Duration;

use crate::error::ScrapeError;
use crate::vlan::{Port, PortPvid, PortPvidMapping, Vlan, VlanId, VlanMode, VlanSet};

/// Any opening tag: name and raw attribute text.
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<([a-zA-Z][a-zA-Z0-9]*)\b([^>]*)>").expect("Invalid regex pattern")
});

/// One attribute inside a tag, with double, single or no quotes.
static ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([a-zA-Z_:][-a-zA-Z0-9_:.]*)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+))"#)
        .expect("Invalid regex pattern")
});

static ENTITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(#[0-9]+|#[xX][0-9a-fA-F]+|[a-zA-Z]+);").expect("Invalid regex pattern")
});

static CANNOT_REMOVE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)Cannot remove port @?([0-9]+)@? from this VLAN. Change its PVID first")
        .expect("Invalid regex pattern")
});

static UPTIME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)([0-9]+) *hrs, *([0-9]+) *mins, *([0-9]+) *secs")
        .expect("Invalid regex pattern")
});

/// Text the device shows when a VLAN is still in use.
pub const VLAN_IN_USE_TEXT: &str = "You can not remove this VLAN";

/// An opening tag located in a page.
#[derive(Debug, Clone, Copy)]
struct Tag<'h> {
    name: &'h str,
    attrs: &'h str,
    start: usize,
    end: usize,
}

impl Tag<'_> {
    fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    fn attr(&self, name: &str) -> Option<String> {
        ATTR_RE
            .captures_iter(self.attrs)
            .find(|caps| caps.get(1).is_some_and(|m| m.as_str().eq_ignore_ascii_case(name)))
            .and_then(|caps| {
                caps.get(2)
                    .or_else(|| caps.get(3))
                    .or_else(|| caps.get(4))
                    .map(|m| decode_entities(m.as_str()))
            })
    }

    fn attr_is(&self, name: &str, value: &str) -> bool {
        self.attr(name).is_some_and(|v| v == value)
    }

    fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .is_some_and(|v| v.split_whitespace().any(|c| c == class))
    }

    /// Text directly following the tag, up to the next tag.
    fn text(&self, html: &str) -> String {
        let rest = &html[self.end..];
        let stop = rest.find('<').unwrap_or(rest.len());
        decode_entities(rest[..stop].trim())
    }

    /// Content up to the first matching closing tag.
    fn inner<'h>(&self, html: &'h str) -> &'h str {
        let rest = &html[self.end..];
        let close = format!("</{}", self.name.to_ascii_lowercase());
        let stop = rest
            .to_ascii_lowercase()
            .find(&close)
            .unwrap_or(rest.len());
        &rest[..stop]
    }
}

fn tags(html: &str) -> impl Iterator<Item = Tag<'_>> {
    TAG_RE.captures_iter(html).filter_map(|caps| {
        let whole = caps.get(0)?;
        Some(Tag {
            name: caps.get(1)?.as_str(),
            attrs: caps.get(2).map_or("", |m| m.as_str()),
            start: whole.start(),
            end: whole.end(),
        })
    })
}

fn find_tag<'h>(html: &'h str, name: &str, predicate: impl Fn(&Tag<'h>) -> bool) -> Option<Tag<'h>> {
    tags(html).find(|tag| tag.is(name) && predicate(tag))
}

/// Splits a list body into the markup of each `<li>` entry.
fn list_items(list: &str) -> Vec<&str> {
    let bounds: Vec<(usize, usize)> = tags(list)
        .filter(|tag| tag.is("li"))
        .map(|tag| (tag.start, tag.end))
        .collect();

    bounds
        .iter()
        .enumerate()
        .map(|(i, (_, end))| {
            let stop = bounds.get(i + 1).map_or(list.len(), |next| next.0);
            &list[*end..stop]
        })
        .collect()
}

fn list_by_id<'h>(html: &'h str, id: &str) -> Result<&'h str, ScrapeError> {
    find_tag(html, "ul", |tag| tag.attr_is("id", id))
        .map(|tag| tag.inner(html))
        .ok_or_else(|| ScrapeError::missing(format!("ul#{id}")))
}

/// Decodes the HTML entities the device uses in names and values.
#[must_use]
pub fn decode_entities(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }

    ENTITY_RE
        .replace_all(raw, |caps: &Captures<'_>| {
            let entity = &caps[1];
            let decoded = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "nbsp" => Some(' '),
                _ => entity
                    .strip_prefix("#x")
                    .or_else(|| entity.strip_prefix("#X"))
                    .map_or_else(
                        || entity.strip_prefix('#').and_then(|d| d.parse::<u32>().ok()),
                        |hex| u32::from_str_radix(hex, 16).ok(),
                    )
                    .and_then(char::from_u32),
            };
            decoded.map_or_else(|| caps[0].to_string(), String::from)
        })
        .into_owned()
}

/// Extracts the VLAN table (`ul#AQVTbl`).
///
/// # Errors
///
/// Returns an error if the table or a row's fields are missing or malformed.
pub fn extract_vlan_table(html: &str) -> Result<VlanSet, ScrapeError> {
    let list = list_by_id(html, "AQVTbl")?;
    let mut vlans = VlanSet::new();

    for item in list_items(list) {
        let Some(id_tag) = find_tag(item, "span", |t| t.attr_is("list-vid", "4")) else {
            continue;
        };
        let raw_id = id_tag.text(item);
        let id = raw_id
            .parse::<u16>()
            .ok()
            .and_then(VlanId::new)
            .ok_or_else(|| ScrapeError::invalid("VLAN ID", raw_id.as_str()))?;

        let name = find_tag(item, "span", |t| t.attr_is("list-vnm", "4"))
            .map(|t| t.text(item))
            .ok_or_else(|| ScrapeError::missing(format!("span[list-vnm] for VLAN {id}")))?;

        let codes = find_tag(item, "input", |t| t.attr_is("list-vhidmem", "4"))
            .and_then(|t| t.attr("value"))
            .ok_or_else(|| ScrapeError::missing(format!("input[list-vhidmem] for VLAN {id}")))?;

        let vlan = Vlan::from_access_string(name, &codes)
            .ok_or_else(|| ScrapeError::invalid(format!("access string of VLAN {id}"), codes))?;

        vlans.insert(id, vlan);
    }

    Ok(vlans)
}

/// Extracts the PVID table (`ul#pvidList`).
///
/// The selected PVID of each port is marked with a trailing `*`.
///
/// # Errors
///
/// Returns an error if the table or a row's fields are missing or malformed.
pub fn extract_pvid_table(html: &str) -> Result<PortPvidMapping, ScrapeError> {
    let list = list_by_id(html, "pvidList")?;
    let mut mapping = PortPvidMapping::new();

    for item in list_items(list) {
        let Some(port_tag) = find_tag(item, "span", |t| t.has_class("port-count")) else {
            continue;
        };
        let raw_port = port_tag.text(item);
        let port = raw_port
            .parse::<u8>()
            .ok()
            .and_then(Port::new)
            .ok_or_else(|| ScrapeError::invalid("PVID table port", raw_port.as_str()))?;

        let raw_list = find_tag(item, "span", |t| t.has_class("pvid-table-vlan-list"))
            .map(|t| t.text(item))
            .ok_or_else(|| ScrapeError::missing(format!("span.pvid-table-vlan-list for port {port}")))?;

        let mut entry = PortPvid::default();
        for raw in raw_list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let (digits, selected) = raw
                .strip_suffix('*')
                .map_or((raw, false), |d| (d.trim(), true));
            let id = digits
                .parse::<u16>()
                .ok()
                .and_then(VlanId::new)
                .ok_or_else(|| ScrapeError::invalid(format!("PVID option of port {port}"), raw))?;
            if selected {
                entry.selected = Some(id);
            }
            entry.options.insert(id);
        }

        mapping.insert(port, entry);
    }

    Ok(mapping)
}

/// Extracts the active VLAN mode.
///
/// The active mode is the `vlanmode` element that contains a
/// `span.status-text`.
///
/// # Errors
///
/// Returns an error if no active mode marker is found or its code is unknown.
pub fn extract_vlan_mode(html: &str) -> Result<VlanMode, ScrapeError> {
    let candidates: Vec<(Tag<'_>, String)> = tags(html)
        .filter_map(|tag| tag.attr("vlanmode").map(|code| (tag, code)))
        .collect();

    for (i, (tag, code)) in candidates.iter().enumerate() {
        let stop = candidates.get(i + 1).map_or(html.len(), |(next, _)| next.start);
        let scope = &html[tag.end..stop];
        if find_tag(scope, "span", |t| t.has_class("status-text")).is_some() {
            return VlanMode::from_wire_code(code)
                .ok_or_else(|| ScrapeError::invalid("VLAN mode", code.as_str()));
        }
    }

    Err(ScrapeError::missing("[vlanmode] span.status-text"))
}

/// Returns the port named in a "Cannot remove port N" response.
#[must_use]
pub fn cannot_remove_port(html: &str) -> Option<Port> {
    CANNOT_REMOVE_RE
        .captures(html)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<u8>().ok())
        .and_then(Port::new)
}

/// Extracts the login salt (`input#rand`).
///
/// # Errors
///
/// Returns an error if the marker is missing.
pub fn extract_login_rand(html: &str) -> Result<String, ScrapeError> {
    find_tag(html, "input", |t| t.attr_is("id", "rand"))
        .and_then(|t| t.attr("value"))
        .ok_or_else(|| ScrapeError::missing("input#rand"))
}

/// Returns true if the page is the post-login redirect to the home page.
#[must_use]
pub fn login_succeeded(html: &str) -> bool {
    find_tag(html, "body", |t| t.attr_is("onload", "loadHomePage()")).is_some()
}

/// Extracts the login error message, if the page shows one.
#[must_use]
pub fn extract_login_error(html: &str) -> Option<String> {
    find_tag(html, "span", |t| t.attr_is("id", "loginPageErrorMsg"))
        .map(|t| t.text(html))
        .filter(|msg| !msg.is_empty())
}

/// Extracts the session token (`input[name=Gambit]`).
///
/// # Errors
///
/// Returns an error if the marker is missing.
pub fn extract_token(html: &str) -> Result<String, ScrapeError> {
    find_tag(html, "input", |t| t.attr_is("name", "Gambit"))
        .and_then(|t| t.attr("value"))
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ScrapeError::missing("input[name=Gambit]"))
}

/// Extracts the running firmware version (`span.firm-data`).
///
/// # Errors
///
/// Returns an error if the marker is missing.
pub fn extract_firmware_version(html: &str) -> Result<String, ScrapeError> {
    find_tag(html, "span", |t| t.has_class("firm-data"))
        .map(|t| t.text(html))
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ScrapeError::missing("span.firm-data"))
}

/// Extracts the page heading (`span.heading-1`).
#[must_use]
pub fn extract_heading(html: &str) -> Option<String> {
    find_tag(html, "span", |t| t.has_class("heading-1")).map(|t| t.text(html))
}

/// Extracts the uptime shown next to `div#timezone-area`.
///
/// # Errors
///
/// Returns an error if the marker or the uptime text is missing.
pub fn extract_uptime(html: &str) -> Result<Duration, ScrapeError> {
    let anchor = find_tag(html, "div", |t| t.attr_is("id", "timezone-area"))
        .ok_or_else(|| ScrapeError::missing("div#timezone-area"))?;

    let caps = UPTIME_RE
        .captures(&html[anchor.end..])
        .ok_or_else(|| ScrapeError::missing("uptime 'X hrs, Y mins, Z secs'"))?;

    let field = |i: usize| -> Result<u64, ScrapeError> {
        caps.get(i)
            .and_then(|m| m.as_str().parse::<u64>().ok())
            .ok_or_else(|| ScrapeError::invalid("uptime", &caps[0]))
    };

    Ok(Duration::from_secs(field(1)? * 3600 + field(2)? * 60 + field(3)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vlan::AccessState;

    const VLAN_PAGE: &str = r#"
<html><body>
<div class="vlan-modes">
  <div class="mode-item" vlanmode="noVlan"><span class="mode-label">No VLANs</span></div>
  <div class="mode-item active" vlanmode="adv8021Q"><span class="mode-label">Advanced 802.1Q</span><span class="status-text">Active</span></div>
  <div class="mode-item" vlanmode="bsc8021Q"><span class="mode-label">Basic 802.1Q</span></div>
</div>
<ul id="AQVTbl" class="list">
  <li class="list-item">
    <span list-vid="4">1</span>
    <span list-vnm="4">Default</span>
    <input type="hidden" list-vhidmem="4" value="2222333322222222">
  </li>
  <li class="list-item">
    <span list-vid="4">10</span>
    <span list-vnm="4">Cams &amp; Doors</span>
    <input type="hidden" list-vhidmem="4" value="3333222213333333"/>
  </li>
</ul>
<ul id="pvidList">
  <li><span class="port-count">1</span><span class="hid-txt pvid-table-vlan-list">1*</span></li>
  <li><span class="port-count">5</span><span class="hid-txt pvid-table-vlan-list">1,10*</span></li>
  <li><span class="port-count">9</span><span class="hid-txt pvid-table-vlan-list">1*,10</span></li>
</ul>
</body></html>
"#;

    fn port(n: u8) -> Port {
        Port::new(n).expect("valid port")
    }

    fn id(n: u16) -> VlanId {
        VlanId::new(n).expect("valid id")
    }

    #[test]
    fn test_extract_vlan_table() {
        let vlans = extract_vlan_table(VLAN_PAGE).expect("table");
        assert_eq!(vlans.len(), 2);

        let cams = vlans.get(id(10)).expect("VLAN 10");
        assert_eq!(cams.name, "Cams & Doors");
        assert_eq!(cams.access(port(5)), AccessState::Untagged);
        assert_eq!(cams.access(port(9)), AccessState::Tagged);
        assert_eq!(cams.access(port(1)), AccessState::Excluded);
        assert_eq!(cams.access_string(), "3333222213333333");
    }

    #[test]
    fn test_extract_pvid_table() {
        let mapping = extract_pvid_table(VLAN_PAGE).expect("pvid table");
        assert_eq!(mapping.selected(port(1)), Some(id(1)));
        assert_eq!(mapping.selected(port(5)), Some(id(10)));
        assert!(mapping.can_select(port(9), id(10)));
        assert!(!mapping.can_select(port(1), id(10)));
    }

    #[test]
    fn test_extract_vlan_mode() {
        assert_eq!(extract_vlan_mode(VLAN_PAGE).expect("mode"), VlanMode::Advanced8021Q);
        assert!(extract_vlan_mode("<html></html>").is_err());
    }

    #[test]
    fn test_missing_markers() {
        assert!(matches!(
            extract_vlan_table("<html><ul id=\"other\"></ul></html>"),
            Err(ScrapeError::MissingMarker { .. })
        ));
        assert!(extract_pvid_table("<html></html>").is_err());
    }

    #[test]
    fn test_malformed_access_string() {
        let page = r#"<ul id="AQVTbl"><li><span list-vid="4">7</span><span list-vnm="4">x</span><input list-vhidmem="4" value="22"></li></ul>"#;
        assert!(matches!(
            extract_vlan_table(page),
            Err(ScrapeError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_cannot_remove_port() {
        let body = "<div class=\"err\">Cannot remove port 5 from this VLAN. Change its PVID first.</div>";
        assert_eq!(cannot_remove_port(body), Some(port(5)));
        assert_eq!(
            cannot_remove_port("cannot remove port @12@ from this VLAN. Change its PVID first"),
            Some(port(12))
        );
        assert_eq!(cannot_remove_port(VLAN_PAGE), None);
    }

    #[test]
    fn test_login_markers() {
        let login = r#"<html><body><form><input type="hidden" id="rand" value="1234567"></form>
            <span id="loginPageErrorMsg">Maximum sessions reached</span></body></html>"#;
        assert_eq!(extract_login_rand(login).expect("rand"), "1234567");
        assert!(!login_succeeded(login));
        assert_eq!(extract_login_error(login).as_deref(), Some("Maximum sessions reached"));

        let home = r#"<html><body onload="loadHomePage()"><input type=hidden name="Gambit" value="abcDEF123"></body></html>"#;
        assert!(login_succeeded(home));
        assert_eq!(extract_token(home).expect("token"), "abcDEF123");
    }

    #[test]
    fn test_firmware_markers() {
        let page = r#"<div><span class="firm-label">Version</span><span class="firm-data">1.0.5.4</span></div>
            <span class="heading-1">FIRMWARE</span>"#;
        assert_eq!(extract_firmware_version(page).expect("version"), "1.0.5.4");
        assert_eq!(extract_heading(page).as_deref(), Some("FIRMWARE"));
    }

    #[test]
    fn test_extract_uptime() {
        let page = r#"<div id="timezone-area"><span>UTC</span></div><div><span> 2 hrs, 3 mins, 4 secs </span></div>"#;
        assert_eq!(extract_uptime(page).expect("uptime"), Duration::from_secs(7384));
        assert!(extract_uptime("<div id=\"timezone-area\"></div>").is_err());
    }

    #[test]
    fn test_decode_entities() {
        assert_eq!(decode_entities("a&amp;b &#65;&#x42; &lt;c&gt;"), "a&b AB <c>");
        assert_eq!(decode_entities("&bogus;"), "&bogus;");
    }
}
