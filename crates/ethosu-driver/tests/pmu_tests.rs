//! PMU behaviour across inferences, resets and power loss

use std::sync::Arc;

use ethosu_driver::{
    counter_mask, Driver, DriverConfig, PayloadBuilder, PmuEvent, SimConfig, SimulatedNpu,
    CCNT_MASK,
};

fn setup() -> (SimulatedNpu, Arc<Driver>) {
    let sim = SimulatedNpu::new(SimConfig::default());
    let drv = sim.connect(DriverConfig::default()).expect("driver init");
    (sim, drv)
}

fn counting(drv: &Driver) {
    let mut pmu = drv.pmu();
    pmu.set_event_type(0, PmuEvent::NpuActive).unwrap();
    pmu.counter_enable(CCNT_MASK | counter_mask(0));
    pmu.enable();
}

#[test]
fn counters_advance_with_inference() {
    let (_sim, drv) = setup();
    counting(&drv);

    let payload = PayloadBuilder::new().command_stream(&[0; 16]).build();
    drv.invoke(payload.as_bytes(), &[]).unwrap();

    let mut pmu = drv.pmu();
    assert_eq!(pmu.event_counter(0).unwrap(), 16);
    assert_eq!(pmu.cycle_counter(), 16 * SimConfig::default().cycles_per_word);
    assert_eq!(pmu.event_counter(1).unwrap(), 0);
}

#[test]
fn configuration_survives_power_gating() {
    let (sim, drv) = setup();
    counting(&drv);

    let payload = PayloadBuilder::new().command_stream(&[0; 4]).build();
    drv.invoke(payload.as_bytes(), &[]).unwrap();
    drv.invoke(payload.as_bytes(), &[]).unwrap();

    assert_eq!(drv.pmu().event_type(0).unwrap(), Some(PmuEvent::NpuActive));
    assert_eq!(drv.pmu().event_counter(0).unwrap(), 8);
    assert_eq!(sim.peek(ethosu_chip::regs::pmevtyper(0)), PmuEvent::NpuActive.hw_id());
}

#[test]
fn counters_never_decrease_across_power_loss() {
    let (sim, drv) = setup();
    counting(&drv);

    let payload = PayloadBuilder::new().command_stream(&[0; 8]).build();
    let mut last_event = 0;
    let mut last_cycles = 0;
    for round in 0..4 {
        drv.invoke(payload.as_bytes(), &[]).unwrap();
        if round % 2 == 1 {
            sim.power_cycle();
        }
        let mut pmu = drv.pmu();
        let event = pmu.event_counter(0).unwrap();
        let cycles = pmu.cycle_counter();
        assert!(event >= last_event, "round {round}: {event} < {last_event}");
        assert!(cycles >= last_cycles, "round {round}: {cycles} < {last_cycles}");
        last_event = event;
        last_cycles = cycles;
    }
}

#[test]
fn counters_never_decrease_across_soft_reset() {
    let (_sim, drv) = setup();
    counting(&drv);

    let payload = PayloadBuilder::new().command_stream(&[0; 8]).build();
    drv.invoke(payload.as_bytes(), &[]).unwrap();
    let before = drv.pmu().event_counter(0).unwrap();

    drv.with_device(|dev| dev.soft_reset()).unwrap();
    assert!(drv.pmu().event_counter(0).unwrap() >= before);
}
