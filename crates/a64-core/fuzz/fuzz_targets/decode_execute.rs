#![no_main]

use a64_core::{decode, disassemble, Machine, MachineConfig};
use libfuzzer_sys::fuzz_target;

const MEMORY_SIZE: u64 = 0x4000;
const BASE_ADDRESS: u64 = 0x1000;

fuzz_target!(|data: &[u8]| {
    if data.len() < 4 {
        return;
    }

    let word = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
    if let Ok(instruction) = decode(word) {
        let _ = disassemble(&instruction);
        assert_eq!(instruction.encode(), Ok(word));
    }

    let config = MachineConfig {
        memory_size: MEMORY_SIZE,
        base_address: BASE_ADDRESS,
        stack_size: 0x1000,
        tracing_enabled: false,
    };
    let Ok(mut machine) = Machine::new(config) else {
        return;
    };
    let image = &data[..data.len() - data.len() % 4];
    if machine.load_image(image).is_err() {
        return;
    }
    for index in 0..31 {
        machine.set_x(index, BASE_ADDRESS + (index as u64) * 8);
    }
    let _ = machine.run(64);
});
