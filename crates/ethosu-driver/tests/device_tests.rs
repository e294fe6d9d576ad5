//! Register-level properties of `Device` on the simulated NPU

use std::sync::Arc;

use ethosu_chip::regs::{self, prot, regioncfg};
use ethosu_driver::{
    Device, DeviceState, HostedPlatform, MemoryType, ResetPolicy, Security, SimConfig,
    SimulatedNpu,
};

const MEMORY_TYPES: [MemoryType; 4] = [
    MemoryType::Axi0Counter0,
    MemoryType::Axi0Counter1,
    MemoryType::Axi1Counter2,
    MemoryType::Axi1Counter3,
];

fn device(sim: &SimulatedNpu, security: Security) -> Device {
    Device::new(
        Box::new(sim.clone()),
        security,
        ResetPolicy::default(),
        Arc::new(HostedPlatform),
    )
}

#[test]
fn regioncfg_sets_only_its_field() {
    let sim = SimulatedNpu::new(SimConfig::default());
    let dev = device(&sim, Security::default());
    for region in 0..regs::REGION_COUNT {
        for memory_type in MEMORY_TYPES {
            let before = sim.peek(regs::REGIONCFG);
            dev.set_regioncfg(region, memory_type).unwrap();
            let after = sim.peek(regs::REGIONCFG);
            let field = regioncfg::region(region);
            assert_eq!(field.get(after), memory_type.raw(), "region {region}");
            assert_eq!(after & !field.in_place(), before & !field.in_place());
        }
    }
}

#[test]
fn regioncfg_rejects_out_of_range() {
    let sim = SimulatedNpu::new(SimConfig::default());
    let dev = device(&sim, Security::default());
    dev.set_regioncfg(3, MemoryType::Axi1Counter3).unwrap();
    let word = sim.peek(regs::REGIONCFG);

    for region in [8, 9, 64, usize::MAX] {
        assert!(dev.set_regioncfg(region, MemoryType::Axi0Counter1).is_err());
    }
    for raw in [4, 5, 0xFF, u32::MAX] {
        assert!(dev.set_regioncfg_raw(0, raw).is_err());
    }
    assert_eq!(sim.peek(regs::REGIONCFG), word);
}

#[test]
fn write_shadow_round_trip() {
    let sim = SimulatedNpu::new(SimConfig::default());
    let dev = device(&sim, Security::default());
    for value in [0, 1, 0x55AA_55AA, u32::MAX] {
        let shadow = dev.write_reg_shadow(regs::pmevtyper(1), value);
        assert_eq!(shadow, value);
        assert_eq!(dev.read_reg(regs::pmevtyper(1)), value);
    }
}

#[test]
fn soft_reset_is_idempotent() {
    for (secure, privileged) in [(false, false), (false, true), (true, false), (true, true)] {
        let sim = SimulatedNpu::new(SimConfig::default());
        let mut dev = device(&sim, Security { secure, privileged });

        dev.soft_reset().unwrap();
        let first = dev.proto();
        dev.soft_reset().unwrap();
        assert_eq!(dev.proto(), first);
        assert_eq!(dev.state(), DeviceState::Ready);
        assert_eq!(prot::ACTIVE_CPL.get(first), u32::from(privileged));
        assert_eq!(prot::ACTIVE_CSL.get(first), u32::from(!secure));
    }
}

#[test]
fn reset_waits_for_slow_hardware() {
    let sim = SimulatedNpu::new(SimConfig {
        reset_polls: 500,
        ..SimConfig::default()
    });
    let mut dev = device(&sim, Security::default());
    dev.soft_reset().unwrap();
    assert_eq!(dev.state(), DeviceState::Ready);
}
