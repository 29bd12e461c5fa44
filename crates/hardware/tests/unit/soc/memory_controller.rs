//! Memory latency models.

use pretty_assertions::assert_eq;
use rstest::rstest;

use atomsim_core::common::{AccessType, ConfigError, PhysAddr};
use atomsim_core::config::{DramConfig, MemoryConfig, MemoryControllerKind};
use atomsim_core::soc::memory::controller::{
    READ_HIT_LATENCY, READ_MISS_LATENCY, WRITE_HIT_LATENCY, WRITE_MISS_LATENCY,
};
use atomsim_core::soc::memory::stacked::{
    LAYER_COUNT, STACKED_MISS_LATENCY, stacked_hit_latency,
};
use atomsim_core::soc::memory::{
    DramController, DramLayout, LatencyOracle, SimpleController, StackOrganisation,
    StackedDramController, build_oracle,
};

/// First bit of the row field under the default 4 GiB geometry.
const ROW_SHIFT: u32 = 28;
/// First bit of the bank field under the default geometry.
const BANK_SHIFT: u32 = 22;

fn dram() -> DramController {
    DramController::new(&DramConfig::default()).unwrap()
}

fn pa(addr: u64) -> PhysAddr {
    PhysAddr::new(addr)
}

#[test]
fn simple_controller_is_constant() {
    let mut mc = SimpleController::new(7);
    assert_eq!(mc.latency(pa(0), AccessType::Read), 7);
    assert_eq!(mc.latency(pa(0xdead_beef), AccessType::Write), 7);
    assert_eq!(mc.latency(pa(0x40), AccessType::Fetch), 7);
}

#[test]
fn latency_constants() {
    assert_eq!(READ_HIT_LATENCY, 90);
    assert_eq!(READ_MISS_LATENCY, 135);
    assert_eq!(WRITE_HIT_LATENCY, 180);
    assert_eq!(WRITE_MISS_LATENCY, 225);
}

#[test]
fn row_buffer_hits_and_conflicts() {
    let mut mc = dram();
    let row0 = 0x100;
    let row1 = (1 << ROW_SHIFT) | 0x100;

    assert_eq!(mc.latency(pa(row0), AccessType::Read), READ_MISS_LATENCY);
    assert_eq!(mc.latency(pa(row0 + 8), AccessType::Read), READ_HIT_LATENCY);
    assert_eq!(mc.latency(pa(row0), AccessType::Write), WRITE_HIT_LATENCY);
    assert_eq!(mc.latency(pa(row1), AccessType::Write), WRITE_MISS_LATENCY);
    assert_eq!(mc.open_row(pa(row0)), Some(1));
    assert_eq!(mc.latency(pa(row0), AccessType::Read), READ_MISS_LATENCY);
}

#[test]
fn fetch_is_charged_as_read() {
    let mut mc = dram();
    assert_eq!(mc.latency(pa(0), AccessType::Fetch), READ_MISS_LATENCY);
    assert_eq!(mc.latency(pa(0), AccessType::Fetch), READ_HIT_LATENCY);
}

#[test]
fn banks_keep_independent_rows() {
    let mut mc = dram();
    let bank0 = 0;
    let bank1 = (1 << BANK_SHIFT) | (3 << ROW_SHIFT);
    let _ = mc.latency(pa(bank0), AccessType::Read);
    let _ = mc.latency(pa(bank1), AccessType::Read);
    assert_eq!(mc.open_row(pa(bank0)), Some(0));
    assert_eq!(mc.open_row(pa(bank1)), Some(3));
    assert_eq!(mc.latency(pa(bank0), AccessType::Read), READ_HIT_LATENCY);
}

#[test]
fn banks_start_closed() {
    let mc = dram();
    assert_eq!(mc.open_row(pa(0)), None);
}

#[test]
fn default_layout_decodes_fields() {
    let layout = DramLayout::new(&DramConfig::default()).unwrap();
    assert_eq!(layout.bus_offset_bits, 19);
    let addr = (5 << ROW_SHIFT) | (1 << 27) | (6 << BANK_SHIFT) | (1 << 19) | 0x7ffff;
    assert_eq!(layout.decode(addr), (1, 1, 6, 5));
}

#[rstest]
#[case::dimms_not_pow2(
    DramConfig { dimms: 3, ..DramConfig::default() },
    ConfigError::NotPowerOfTwo { field: "dram.dimms", value: 3 }
)]
#[case::zero_banks(
    DramConfig { banks: 0, ..DramConfig::default() },
    ConfigError::Zero { field: "dram.banks" }
)]
#[case::too_small(
    DramConfig { size: 1 << 12, ..DramConfig::default() },
    ConfigError::AddressLayout { needed: 13, available: 12 }
)]
#[case::zero_columns(
    DramConfig { col_size: 0, ..DramConfig::default() },
    ConfigError::Zero { field: "dram.col_size" }
)]
fn invalid_geometry_rejected(#[case] config: DramConfig, #[case] expected: ConfigError) {
    assert_eq!(DramController::new(&config).unwrap_err(), expected);
}

#[test]
fn build_oracle_follows_selection() {
    let mut config = MemoryConfig::default();
    config.simple_latency = 11;
    let mut simple = build_oracle(&config).unwrap();
    assert_eq!(simple.latency(pa(0), AccessType::Read), 11);

    config.controller = MemoryControllerKind::Dram;
    let mut dram = build_oracle(&config).unwrap();
    assert_eq!(dram.latency(pa(0), AccessType::Read), READ_MISS_LATENCY);

    config.controller = MemoryControllerKind::MultiLayer;
    let mut stacked = build_oracle(&config).unwrap();
    assert_eq!(stacked.latency(pa(0), AccessType::Read), STACKED_MISS_LATENCY);
    assert_eq!(stacked.latency(pa(0), AccessType::Write), stacked_hit_latency(0));

    config.dram.banks = 5;
    assert!(build_oracle(&config).is_err());
    config.controller = MemoryControllerKind::Vault;
    assert!(build_oracle(&config).is_err());
}

fn stack(organisation: StackOrganisation) -> StackedDramController {
    StackedDramController::new(&DramConfig::default(), organisation).unwrap()
}

fn row(r: u64) -> PhysAddr {
    pa(r << ROW_SHIFT)
}

#[test]
fn stacked_row_climbs_to_its_layer() {
    let mut mc = stack(StackOrganisation::MultiLayer);
    assert_eq!(mc.latency(row(0), AccessType::Read), 90);
    assert_eq!(mc.latency(row(0), AccessType::Read), 47);
    assert_eq!(mc.latency(row(1), AccessType::Write), 90);
    assert_eq!(mc.latency(row(1), AccessType::Fetch), 49);
    assert_eq!(mc.buffered_layer(0), Some(0));
    assert_eq!(mc.buffered_layer(1), Some(1));
    assert_eq!(mc.buffered_layer(2), None);
}

#[test]
fn multi_layer_replaces_round_robin() {
    let mut mc = stack(StackOrganisation::MultiLayer);
    for r in 0..LAYER_COUNT as u64 {
        assert_eq!(mc.latency(row(r), AccessType::Read), STACKED_MISS_LATENCY);
    }
    assert_eq!(mc.latency(row(7), AccessType::Read), stacked_hit_latency(7));

    // A ninth row takes layer 0, the next one layer 1.
    assert_eq!(mc.latency(row(8), AccessType::Read), STACKED_MISS_LATENCY);
    assert_eq!(mc.buffered_layer(8), Some(0));
    assert_eq!(mc.buffered_layer(0), None);
    assert_eq!(mc.latency(row(0), AccessType::Read), STACKED_MISS_LATENCY);
    assert_eq!(mc.buffered_layer(0), Some(1));
    assert_eq!(mc.buffered_layer(1), None);
}

#[test]
fn vault_fills_every_vault_of_a_layer_first() {
    let mut mc = stack(StackOrganisation::Vault);
    assert_eq!(mc.organisation(), StackOrganisation::Vault);
    for r in 0..=LAYER_COUNT as u64 {
        assert_eq!(mc.latency(row(r), AccessType::Read), STACKED_MISS_LATENCY);
    }
    assert_eq!(mc.buffered_layer(3), Some(0));
    assert_eq!(mc.buffered_layer(8), Some(1));
    assert_eq!(mc.latency(row(3), AccessType::Read), 47);
    assert_eq!(mc.latency(row(8), AccessType::Read), 49);
}

#[rstest]
#[case(StackOrganisation::MultiLayer, 0, 0)]
#[case(StackOrganisation::MultiLayer, 0x2000_0000, 1)]
#[case(StackOrganisation::MultiLayer, 0xe000_0000, 7)]
#[case(StackOrganisation::Vault, 9 << 26, 1)]
#[case(StackOrganisation::Vault, 0x3f << 26, 7)]
#[case(StackOrganisation::Vault, 0xe000_0000, 0)]
fn layer_follows_address(
    #[case] organisation: StackOrganisation,
    #[case] addr: u64,
    #[case] layer: usize,
) {
    assert_eq!(stack(organisation).layer_of(pa(addr)), layer);
}

#[test]
fn stacked_accesses_charge_their_layer() {
    let mut mc = stack(StackOrganisation::MultiLayer);
    let _ = mc.latency(pa(0), AccessType::Read);
    let _ = mc.latency(pa(0x40), AccessType::Read);
    let _ = mc.latency(pa(0xe000_0000), AccessType::Write);
    assert_eq!(mc.layer_busy(), &[90 + 47, 0, 0, 0, 0, 0, 0, 90]);
    assert_eq!(mc.busiest_layer_cycles(), 137);
}
