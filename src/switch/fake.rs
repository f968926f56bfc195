//! Stateful in-memory switch for tests.
//!
//! Renders the same markers as the real VLAN page and enforces the
//! device rules the reconciler has to work around:
//! a port cannot be excluded from its PVID VLAN, a PVID can only point at
//! a VLAN the port belongs to, and VLAN 1 or a VLAN in use as a PVID
//! cannot be deleted.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt::Write;
use std::sync::{Mutex, MutexGuard};

use crate::error::Result;
use crate::vlan::{AccessState, Port, Vlan, VlanId, VlanMode, VlanSet, DEFAULT_VLAN_NAME};

use super::transport::{RawResponse, SwitchTransport};
use super::vlan::VLAN_PAGE;

/// A one-shot or persistent "Cannot remove port" injection.
#[derive(Debug, Clone, Copy)]
struct Injection {
    vlan: VlanId,
    port: Port,
    persistent: bool,
}

#[derive(Debug)]
struct FakeState {
    mode: VlanMode,
    stuck_mode: bool,
    vlans: VlanSet,
    pvids: BTreeMap<Port, VlanId>,
    injection: Option<Injection>,
    actions: Vec<String>,
}

/// In-memory switch implementing [`SwitchTransport`].
#[derive(Debug)]
pub struct FakeSwitch {
    state: Mutex<FakeState>,
}

impl FakeSwitch {
    /// A switch straight out of the box: VLAN 1 with every port untagged.
    pub fn factory_default() -> Self {
        let default = Port::all().fold(Vlan::new(DEFAULT_VLAN_NAME), |vlan, port| {
            vlan.with_port(port, AccessState::Untagged)
        });

        let mut vlans = VlanSet::new();
        vlans.insert(VlanId::DEFAULT, default);

        Self {
            state: Mutex::new(FakeState {
                mode: VlanMode::Advanced8021Q,
                stuck_mode: false,
                vlans,
                pvids: Port::all().map(|port| (port, VlanId::DEFAULT)).collect(),
                injection: None,
                actions: Vec::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().expect("fake switch lock")
    }

    /// Sets the active VLAN mode.
    pub fn with_mode(self, mode: VlanMode) -> Self {
        self.lock().mode = mode;
        self
    }

    /// Makes mode changes silently do nothing.
    pub fn with_stuck_mode(self) -> Self {
        self.lock().stuck_mode = true;
        self
    }

    /// Installs a VLAN directly, padding unspecified ports as excluded.
    pub fn with_vlan(self, id: u16, vlan: Vlan) -> Self {
        let id = VlanId::new(id).expect("valid id");
        let full = Port::all().fold(Vlan::new(vlan.name.clone()), |acc, port| {
            acc.with_port(port, vlan.access(port))
        });
        self.lock().vlans.insert(id, full);
        self
    }

    /// Sets a port's PVID directly.
    pub fn with_pvid(self, port: u8, id: u16) -> Self {
        let port = Port::new(port).expect("valid port");
        let id = VlanId::new(id).expect("valid id");
        self.lock().pvids.insert(port, id);
        self
    }

    /// Makes the next submission of `vlan` fail with "Cannot remove port".
    pub fn with_cannot_remove_once(self, vlan: u16, port: u8) -> Self {
        self.inject(vlan, port, false)
    }

    /// Makes every submission of `vlan` fail with "Cannot remove port".
    pub fn with_cannot_remove_always(self, vlan: u16, port: u8) -> Self {
        self.inject(vlan, port, true)
    }

    fn inject(self, vlan: u16, port: u8, persistent: bool) -> Self {
        self.lock().injection = Some(Injection {
            vlan: VlanId::new(vlan).expect("valid id"),
            port: Port::new(port).expect("valid port"),
            persistent,
        });
        self
    }

    /// Returns the mutations performed so far.
    pub fn actions(&self) -> Vec<String> {
        self.lock().actions.clone()
    }

    /// Returns the current VLAN table.
    pub fn vlans(&self) -> VlanSet {
        self.lock().vlans.clone()
    }

    /// Returns the current PVID of a port.
    pub fn pvid(&self, port: u8) -> Option<VlanId> {
        let port = Port::new(port)?;
        self.lock().pvids.get(&port).copied()
    }

    /// Clears the action log.
    pub fn clear_actions(&self) {
        self.lock().actions.clear();
    }
}

fn field<'f>(form: &'f [(&str, String)], name: &str) -> Option<&'f str> {
    form.iter()
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.as_str())
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

impl FakeState {
    fn render(&self, message: Option<&str>) -> String {
        let mut page = String::from("<html><body>\n");

        if let Some(message) = message {
            let _ = writeln!(page, "<div class=\"error-msg\">{}</div>", escape(message));
        }

        page.push_str("<div class=\"vlan-modes\">\n");
        for mode in VlanMode::ALL {
            let status = if mode == self.mode {
                "<span class=\"status-text\">Active</span>"
            } else {
                ""
            };
            let _ = writeln!(
                page,
                "<div class=\"mode-item\" vlanmode=\"{}\"><span>{mode}</span>{status}</div>",
                mode.wire_code()
            );
        }
        page.push_str("</div>\n<ul id=\"AQVTbl\">\n");

        for (id, vlan) in self.vlans.iter() {
            let _ = writeln!(
                page,
                "<li><span list-vid=\"4\">{id}</span><span list-vnm=\"4\">{}</span>\
                 <input type=\"hidden\" list-vhidmem=\"4\" value=\"{}\"></li>",
                escape(&vlan.name),
                vlan.access_string()
            );
        }
        page.push_str("</ul>\n<ul id=\"pvidList\">\n");

        for port in Port::all() {
            let selected = self.pvids.get(&port).copied();
            let options: Vec<String> = self
                .vlans
                .iter()
                .filter(|(_, vlan)| vlan.access(port) != AccessState::Excluded)
                .map(|(id, _)| {
                    if Some(id) == selected {
                        format!("{id}*")
                    } else {
                        id.to_string()
                    }
                })
                .collect();
            let _ = writeln!(
                page,
                "<li><span class=\"port-count\">{port}</span>\
                 <span class=\"hid-txt pvid-table-vlan-list\">{}</span></li>",
                options.join(",")
            );
        }
        page.push_str("</ul>\n</body></html>\n");
        page
    }

    fn submit(&mut self, form: &[(&str, String)]) -> Option<String> {
        let id = VlanId::new(field(form, "VLAN_ID")?.parse().ok()?)?;
        let vlan = Vlan::from_access_string(field(form, "VLAN_NAME")?, field(form, "hiddenMem")?)?;

        if let Some(injection) = self.injection {
            if injection.vlan == id {
                if !injection.persistent {
                    self.injection = None;
                }
                return Some(self.reject_port(id, injection.port));
            }
        }

        for port in Port::all() {
            if vlan.access(port) == AccessState::Excluded && self.pvids.get(&port) == Some(&id) {
                return Some(self.reject_port(id, port));
            }
        }

        let verb = if self.vlans.contains(id) { "edit" } else { "add" };
        self.actions.push(format!("{verb} {id}"));
        self.vlans.insert(id, vlan);
        None
    }

    fn reject_port(&mut self, id: VlanId, port: Port) -> String {
        self.actions.push(format!("reject {id} port {port}"));
        format!("Cannot remove port {port} from this VLAN. Change its PVID first.")
    }

    fn set_pvid(&mut self, form: &[(&str, String)]) {
        let port = field(form, "PORT")
            .and_then(|p| p.parse().ok())
            .and_then(Port::new);
        let id = field(form, "PVID")
            .and_then(|v| v.parse().ok())
            .and_then(VlanId::new);

        if let (Some(port), Some(id)) = (port, id) {
            let member = self
                .vlans
                .get(id)
                .is_some_and(|vlan| vlan.access(port) != AccessState::Excluded);
            if member {
                self.actions.push(format!("pvid {port}={id}"));
                self.pvids.insert(port, id);
            }
        }
    }

    fn delete(&mut self, form: &[(&str, String)]) -> Option<String> {
        let id = VlanId::new(field(form, "VLAN_ID")?.parse().ok()?)?;
        if id.is_default() || self.pvids.values().any(|pvid| *pvid == id) {
            return Some(String::from("You can not remove this VLAN."));
        }
        if self.vlans.get(id).is_some() {
            self.actions.push(format!("delete {id}"));
        }
        let remaining: VlanSet = self
            .vlans
            .iter()
            .filter(|(other, _)| *other != id)
            .map(|(other, vlan)| (other, vlan.clone()))
            .collect();
        self.vlans = remaining;
        None
    }
}

#[async_trait]
impl SwitchTransport for FakeSwitch {
    async fn get(&self, path: &str) -> Result<RawResponse> {
        if path != VLAN_PAGE {
            return Ok(RawResponse::new(404, "not found"));
        }
        Ok(RawResponse::new(200, self.lock().render(None)))
    }

    async fn post_form(&self, path: &str, form: &[(&str, String)]) -> Result<RawResponse> {
        if path != VLAN_PAGE {
            return Ok(RawResponse::new(404, "not found"));
        }

        let mut state = self.lock();

        if let Some(code) = field(form, "VLAN_MOD_SET") {
            if !state.stuck_mode {
                if let Some(mode) = VlanMode::from_wire_code(code) {
                    state.actions.push(format!("mode {code}"));
                    state.mode = mode;
                }
            }
            return Ok(RawResponse::new(200, state.render(None)));
        }

        let message = match field(form, "ACTION") {
            Some("add") => state.submit(form),
            Some("setPvid") => {
                state.set_pvid(form);
                None
            }
            Some("delete") => state.delete(form),
            _ => Some(String::from("Unknown action")),
        };

        Ok(RawResponse::new(200, state.render(message.as_deref())))
    }
}
