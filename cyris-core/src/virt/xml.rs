//! Domain XML generation, adapted from `examples/Galev01-LimiQuantix/agent/limiquantix-hypervisor/src/xml.rs`'s
//! `DomainXmlBuilder`: same direct string-templating shape, trimmed of the
//! OVS virtualport and guest-agent-protocol channel branches this spec has
//! no use for, generalized to the orchestrator's `DomainSpec`.

use crate::model::GuestOsFamily;
use crate::virt::provider::{DomainSpec, Firmware};

pub struct DomainXmlBuilder<'a> {
    spec: &'a DomainSpec,
}

impl<'a> DomainXmlBuilder<'a> {
    pub fn new(spec: &'a DomainSpec) -> Self {
        Self { spec }
    }

    pub fn build(&self) -> String {
        let mut xml = String::new();
        let s = self.spec;

        xml.push_str(&format!(
            "<domain type='kvm'>\n  <name>{}</name>\n  <uuid>{}</uuid>\n  <memory unit='MiB'>{}</memory>\n  <vcpu placement='static'>{}</vcpu>\n",
            s.name, s.uuid, s.memory_mib, s.vcpus
        ));

        xml.push_str(&self.build_os_section());

        xml.push_str("  <features>\n    <acpi/>\n    <apic/>\n  </features>\n");

        let cpu_mode = if s.os_family.is_windows() { "host-model" } else { "host-passthrough" };
        xml.push_str(&format!("  <cpu mode='{cpu_mode}'/>\n"));

        xml.push_str(
            "  <clock offset='utc'>\n    <timer name='rtc' tickpolicy='catchup'/>\n    <timer name='pit' tickpolicy='delay'/>\n    <timer name='hpet' present='no'/>\n  </clock>\n",
        );
        xml.push_str("  <on_poweroff>destroy</on_poweroff>\n  <on_reboot>restart</on_reboot>\n  <on_crash>destroy</on_crash>\n");

        xml.push_str("  <devices>\n");
        xml.push_str("    <emulator>/usr/bin/qemu-system-x86_64</emulator>\n");
        xml.push_str(&format!(
            "    <disk type='file' device='disk'>\n      <driver name='qemu' type='qcow2'/>\n      <source file='{}'/>\n      <target dev='vda' bus='virtio'/>\n    </disk>\n",
            s.disk_path
        ));
        for (idx, nic) in s.nics.iter().enumerate() {
            xml.push_str(&format!(
                "    <interface type='bridge'>\n      <source bridge='{}'/>\n      <mac address='{}'/>\n      <model type='virtio'/>\n      <alias name='net{}'/>\n    </interface>\n",
                nic.bridge_name, nic.mac_address, idx
            ));
        }
        xml.push_str("    <console type='pty'>\n      <target type='serial' port='0'/>\n    </console>\n");
        xml.push_str("    <graphics type='vnc' port='-1' autoport='yes' listen='127.0.0.1'/>\n");
        xml.push_str(&format!(
            "    <channel type='unix'>\n      <target type='virtio' name='org.qemu.guest_agent.0'/>\n      <alias name='channel0'/>\n    </channel>\n"
        ));
        xml.push_str("  </devices>\n</domain>\n");

        xml
    }

    fn build_os_section(&self) -> String {
        match self.spec.firmware {
            Firmware::Bios => {
                "  <os>\n    <type arch='x86_64' machine='q35'>hvm</type>\n    <boot dev='hd'/>\n  </os>\n".to_string()
            }
            Firmware::Uefi => format!(
                "  <os>\n    <type arch='x86_64' machine='q35'>hvm</type>\n    <loader readonly='yes' type='pflash'>/usr/share/OVMF/OVMF_CODE.fd</loader>\n    <nvram>/var/lib/libvirt/qemu/nvram/{}_VARS.fd</nvram>\n  </os>\n",
                self.spec.name
            ),
        }
    }
}

/// Generates a locally-administered, unicast MAC of the form
/// `52:54:00:xx:xx:xx`, matching `limiquantix-hypervisor::libvirt::backend::generate_mac_address`.
/// Collisions within a range are resolved by the caller rehashing with a
/// different salt, per §4.2.
pub fn generate_mac_address(seed: u64) -> String {
    let b = seed.to_le_bytes();
    format!("52:54:00:{:02x}:{:02x}:{:02x}", b[0], b[1], b[2])
}

/// Deterministic MAC derivation from `(range_id, guest_id, idx, iface)`,
/// rehashed with an incrementing salt on collision.
pub fn mac_for(range_id: &str, guest_id: &str, idx: u32, iface: &str, salt: u32) -> String {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};
    let mut hasher = DefaultHasher::new();
    (range_id, guest_id, idx, iface, salt).hash(&mut hasher);
    generate_mac_address(hasher.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::virt::provider::{DomainSpec, Firmware, NicSpec};

    fn sample_spec() -> DomainSpec {
        DomainSpec {
            name: "range101-g1-0-abcd1234".into(),
            uuid: "11111111-1111-1111-1111-111111111111".into(),
            memory_mib: 1024,
            vcpus: 1,
            disk_path: "/var/lib/cyris/ranges/101/disks/g1-0.qcow2".into(),
            firmware: Firmware::Bios,
            os_family: GuestOsFamily::GenericLinux,
            nics: vec![NicSpec { bridge_name: "cy-abc123-n1".into(), mac_address: "52:54:00:01:02:03".into() }],
        }
    }

    #[test]
    fn builds_well_formed_disk_and_nic_elements() {
        let xml = DomainXmlBuilder::new(&sample_spec()).build();
        assert!(xml.contains("<name>range101-g1-0-abcd1234</name>"));
        assert!(xml.contains("source bridge='cy-abc123-n1'"));
        assert!(xml.contains("bus='virtio'"));
    }

    #[test]
    fn uefi_firmware_adds_loader_and_nvram() {
        let mut spec = sample_spec();
        spec.firmware = Firmware::Uefi;
        let xml = DomainXmlBuilder::new(&spec).build();
        assert!(xml.contains("OVMF_CODE.fd"));
        assert!(xml.contains("_VARS.fd"));
    }

    #[test]
    fn generated_mac_has_local_bit_and_locally_administered_oui() {
        let mac = generate_mac_address(42);
        assert!(mac.starts_with("52:54:00:"));
    }

    #[test]
    fn mac_for_is_deterministic_and_salt_changes_it() {
        let a = mac_for("101", "g1", 0, "eth0", 0);
        let b = mac_for("101", "g1", 0, "eth0", 0);
        let c = mac_for("101", "g1", 0, "eth0", 1);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
