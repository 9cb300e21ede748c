// Copyright 2026 Red Hat, Inc.
// SPDX-License-Identifier: Apache-2.0

//! GPU allow/deny tables matched against the GL renderer string.
//!
//! The deny table is consulted before anything touches the HAL: on the listed chips the probe
//! itself is what locks up or crashes the driver.  The allow table only decides whether the
//! feature is switched on by default once it has been found to work.

use log::debug;

/// Class of machine the crate was built for.  Some rules only apply to one of them.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MachineClass {
    /// Generic ARMv7 build, the target the historical GPU quirks were collected on.
    GenericArmv7,
    Other,
}

impl MachineClass {
    /// Returns the class of the compile target.
    pub fn host() -> MachineClass {
        if cfg!(target_arch = "arm") {
            MachineClass::GenericArmv7
        } else {
            MachineClass::Other
        }
    }
}

/// How a rule's pattern is compared with the renderer string.  Both are case-sensitive.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RendererMatch {
    Exact,
    Substring,
}

/// A single allow or deny entry.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RendererRule {
    pattern: String,
    kind: RendererMatch,
    machine: Option<MachineClass>,
}

impl RendererRule {
    /// Matches renderers equal to `pattern`.
    pub fn exact<S: Into<String>>(pattern: S) -> RendererRule {
        RendererRule {
            pattern: pattern.into(),
            kind: RendererMatch::Exact,
            machine: None,
        }
    }

    /// Matches renderers containing `pattern`.
    pub fn substring<S: Into<String>>(pattern: S) -> RendererRule {
        RendererRule {
            pattern: pattern.into(),
            kind: RendererMatch::Substring,
            machine: None,
        }
    }

    /// Restricts the rule to one machine class.
    pub fn on_machine(mut self, machine: MachineClass) -> RendererRule {
        self.machine = Some(machine);
        self
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn matches(&self, renderer: &str, machine: MachineClass) -> bool {
        if self.machine.is_some_and(|m| m != machine) {
            return false;
        }

        match self.kind {
            RendererMatch::Exact => renderer == self.pattern,
            RendererMatch::Substring => renderer.contains(self.pattern.as_str()),
        }
    }
}

/// Allow/deny tables plus the machine class they are evaluated for.
#[derive(Clone, Debug)]
pub struct GpuPolicy {
    machine: MachineClass,
    deny: Vec<RendererRule>,
    allow: Vec<RendererRule>,
}

impl Default for GpuPolicy {
    fn default() -> GpuPolicy {
        GpuPolicy::with_defaults(MachineClass::host())
    }
}

impl GpuPolicy {
    /// Policy with no rules at all.
    pub fn empty(machine: MachineClass) -> GpuPolicy {
        GpuPolicy {
            machine,
            deny: Vec::new(),
            allow: Vec::new(),
        }
    }

    /// Policy with the built-in quirk tables, evaluated for `machine`.
    pub fn with_defaults(machine: MachineClass) -> GpuPolicy {
        GpuPolicy::empty(machine)
            // Tegra: not needed there and locks up.
            .deny(RendererRule::substring("NVIDIA").on_machine(MachineClass::GenericArmv7))
            // Crashes in eglCreateImageKHR on the Samsung Galaxy Y, maybe others.
            .deny(RendererRule::exact("VideoCore IV HW"))
            // PowerVR SGX 530 is known good.  Other SGX models probably are too.
            .allow(RendererRule::substring("SGX 530").on_machine(MachineClass::GenericArmv7))
    }

    /// Adds a deny rule.
    pub fn deny(mut self, rule: RendererRule) -> GpuPolicy {
        self.deny.push(rule);
        self
    }

    /// Adds an allow rule.
    pub fn allow(mut self, rule: RendererRule) -> GpuPolicy {
        self.allow.push(rule);
        self
    }

    pub fn machine(&self) -> MachineClass {
        self.machine
    }

    pub fn deny_rules(&self) -> &[RendererRule] {
        &self.deny
    }

    pub fn allow_rules(&self) -> &[RendererRule] {
        &self.allow
    }

    /// Returns true if `renderer` must never be probed.
    pub fn is_denied(&self, renderer: &str) -> bool {
        match Self::find(&self.deny, renderer, self.machine) {
            Some(rule) => {
                debug!("renderer {:?} denied by {:?}", renderer, rule.pattern());
                true
            }
            None => false,
        }
    }

    /// Returns true if `renderer` should have direct textures on by default.
    pub fn is_allowed(&self, renderer: &str) -> bool {
        match Self::find(&self.allow, renderer, self.machine) {
            Some(rule) => {
                debug!("renderer {:?} allowed by {:?}", renderer, rule.pattern());
                true
            }
            None => false,
        }
    }

    fn find<'a>(
        rules: &'a [RendererRule],
        renderer: &str,
        machine: MachineClass,
    ) -> Option<&'a RendererRule> {
        rules.iter().find(|rule| rule.matches(renderer, machine))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_and_substring_rules() {
        let exact = RendererRule::exact("VideoCore IV HW");
        assert!(exact.matches("VideoCore IV HW", MachineClass::Other));
        assert!(!exact.matches("VideoCore IV HW rev2", MachineClass::Other));
        assert!(!exact.matches("videocore iv hw", MachineClass::Other));

        let sub = RendererRule::substring("SGX 530");
        assert!(sub.matches("PowerVR SGX 530", MachineClass::Other));
        assert!(!sub.matches("PowerVR SGX 540", MachineClass::Other));
    }

    #[test]
    fn machine_restricted_rules() {
        let rule = RendererRule::substring("NVIDIA").on_machine(MachineClass::GenericArmv7);
        assert!(rule.matches("NVIDIA Tegra 3", MachineClass::GenericArmv7));
        assert!(!rule.matches("NVIDIA Tegra 3", MachineClass::Other));
    }

    #[test]
    fn default_tables_on_armv7() {
        let policy = GpuPolicy::with_defaults(MachineClass::GenericArmv7);

        assert!(policy.is_denied("NVIDIA Tegra"));
        assert!(policy.is_denied("VideoCore IV HW"));
        assert!(!policy.is_denied("Adreno (TM) 320"));

        assert!(policy.is_allowed("PowerVR SGX 530"));
        assert!(!policy.is_allowed("Mali-400 MP"));
    }

    #[test]
    fn default_tables_elsewhere() {
        let policy = GpuPolicy::with_defaults(MachineClass::Other);

        assert!(!policy.is_denied("NVIDIA GeForce"));
        assert!(policy.is_denied("VideoCore IV HW"));
        assert!(!policy.is_allowed("PowerVR SGX 530"));
    }

    #[test]
    fn custom_tables() {
        let policy = GpuPolicy::empty(MachineClass::Other)
            .deny(RendererRule::substring("llvmpipe"))
            .allow(RendererRule::exact("Mali-T628"));

        assert_eq!(policy.deny_rules().len(), 1);
        assert_eq!(policy.allow_rules().len(), 1);
        assert!(policy.is_denied("Gallium 0.4 on llvmpipe"));
        assert!(policy.is_allowed("Mali-T628"));
        assert!(!policy.is_denied("VideoCore IV HW"));
    }
}
