//! Name tables for diagnostics.
//!
//! Maps debug-register offsets and command-stream opcodes to their
//! mnemonic. Used only for log output; lookups return `None` for
//! anything not listed.

/// Look up `key` in a sorted `(key, name)` table.
fn lookup(table: &'static [(u32, &'static str)], key: u32) -> Option<&'static str> {
    table
        .binary_search_by_key(&key, |&(k, _)| k)
        .ok()
        .map(|i| table[i].1)
}

/// Name of the debug register at `offset`.
#[must_use]
pub fn register_name(offset: usize) -> Option<&'static str> {
    u32::try_from(offset).ok().and_then(|o| lookup(REGISTER_NAMES, o))
}

/// Name of a single-word (`cmd0`) command-stream opcode.
#[must_use]
pub fn cmd0_name(opcode: u32) -> Option<&'static str> {
    lookup(CMD0_NAMES, opcode)
}

/// Name of a two-word (`cmd1`) command-stream opcode.
#[must_use]
pub fn cmd1_name(opcode: u32) -> Option<&'static str> {
    lookup(CMD1_NAMES, opcode)
}


/// Debug register names (`0x200..0xB5C`).
#[rustfmt::skip]
const REGISTER_NAMES: &[(u32, &str)] = &[
    (0x200, "KERNEL_X"),
    (0x204, "KERNEL_Y"),
    (0x208, "KERNEL_W_M1"),
    (0x20C, "KERNEL_H_M1"),
    (0x210, "OFM_CBLK_WIDTH_M1"),
    (0x214, "OFM_CBLK_HEIGHT_M1"),
    (0x218, "OFM_CBLK_DEPTH_M1"),
    (0x21C, "IFM_CBLK_DEPTH_M1"),
    (0x220, "OFM_X"),
    (0x224, "OFM_Y"),
    (0x228, "OFM_Z"),
    (0x22C, "IFM_Z"),
    (0x230, "PAD_TOP"),
    (0x234, "PAD_LEFT"),
    (0x238, "IFM_CBLK_WIDTH"),
    (0x23C, "IFM_CBLK_HEIGHT"),
    (0x240, "DMA_IFM_SRC"),
    (0x244, "DMA_IFM_SRC_HI"),
    (0x248, "DMA_IFM_DST"),
    (0x24C, "DMA_OFM_SRC"),
    (0x250, "DMA_OFM_DST"),
    (0x254, "DMA_OFM_DST_HI"),
    (0x258, "DMA_WEIGHT_SRC"),
    (0x25C, "DMA_WEIGHT_SRC_HI"),
    (0x260, "DMA_CMD_SRC"),
    (0x264, "DMA_CMD_SRC_HI"),
    (0x268, "DMA_CMD_SIZE"),
    (0x26C, "DMA_M2M_SRC"),
    (0x270, "DMA_M2M_SRC_HI"),
    (0x274, "DMA_M2M_DST"),
    (0x278, "DMA_M2M_DST_HI"),
    (0x27C, "CURRENT_QREAD"),
    (0x280, "DMA_SCALE_SRC"),
    (0x284, "DMA_SCALE_SRC_HI"),
    (0x2BC, "CURRENT_CMD"),
    (0x800, "IFM_PAD_TOP"),
    (0x804, "IFM_PAD_LEFT"),
    (0x808, "IFM_PAD_RIGHT"),
    (0x80C, "IFM_PAD_BOTTOM"),
    (0x810, "IFM_DEPTH_M1"),
    (0x814, "IFM_PRECISION"),
    (0x81C, "IFM_UPSCALE"),
    (0x824, "IFM_ZERO_POINT"),
    (0x828, "IFM_WIDTH0_M1"),
    (0x82C, "IFM_HEIGHT0_M1"),
    (0x830, "IFM_HEIGHT1_M1"),
    (0x834, "IFM_IB_END"),
    (0x83C, "IFM_REGION"),
    (0x844, "OFM_WIDTH_M1"),
    (0x848, "OFM_HEIGHT_M1"),
    (0x84C, "OFM_DEPTH_M1"),
    (0x850, "OFM_PRECISION"),
    (0x854, "OFM_BLK_WIDTH_M1"),
    (0x858, "OFM_BLK_HEIGHT_M1"),
    (0x85C, "OFM_BLK_DEPTH_M1"),
    (0x860, "OFM_ZERO_POINT"),
    (0x868, "OFM_WIDTH0_M1"),
    (0x86C, "OFM_HEIGHT0_M1"),
    (0x870, "OFM_HEIGHT1_M1"),
    (0x87C, "OFM_REGION"),
    (0x880, "KERNEL_WIDTH_M1"),
    (0x884, "KERNEL_HEIGHT_M1"),
    (0x888, "KERNEL_STRIDE"),
    (0x88C, "PARALLEL_MODE"),
    (0x890, "ACC_FORMAT"),
    (0x894, "ACTIVATION"),
    (0x898, "ACTIVATION_MIN"),
    (0x89C, "ACTIVATION_MAX"),
    (0x8A0, "WEIGHT_REGION"),
    (0x8A4, "SCALE_REGION"),
    (0x8B4, "AB_START"),
    (0x8BC, "BLOCKDEP"),
    (0x8C0, "DMA0_SRC_REGION"),
    (0x8C4, "DMA0_DST_REGION"),
    (0x8C8, "DMA0_SIZE0"),
    (0x8CC, "DMA0_SIZE1"),
    (0x900, "IFM2_BROADCAST"),
    (0x904, "IFM2_SCALAR"),
    (0x924, "IFM2_ZERO_POINT"),
    (0x928, "IFM2_WIDTH0_M1"),
    (0x92C, "IFM2_HEIGHT0_M1"),
    (0x930, "IFM2_HEIGHT1_M1"),
    (0x934, "IFM2_IB_START"),
    (0x93C, "IFM2_REGION"),
    (0xA00, "IFM_BASE0"),
    (0xA04, "IFM_BASE0_HI"),
    (0xA08, "IFM_BASE1"),
    (0xA0C, "IFM_BASE1_HI"),
    (0xA10, "IFM_BASE2"),
    (0xA14, "IFM_BASE2_HI"),
    (0xA18, "IFM_BASE3"),
    (0xA1C, "IFM_BASE3_HI"),
    (0xA20, "IFM_STRIDE_X"),
    (0xA24, "IFM_STRIDE_X_HI"),
    (0xA28, "IFM_STRIDE_Y"),
    (0xA2C, "IFM_STRIDE_Y_HI"),
    (0xA30, "IFM_STRIDE_C"),
    (0xA34, "IFM_STRIDE_C_HI"),
    (0xA40, "OFM_BASE0"),
    (0xA44, "OFM_BASE0_HI"),
    (0xA48, "OFM_BASE1"),
    (0xA4C, "OFM_BASE1_HI"),
    (0xA50, "OFM_BASE2"),
    (0xA54, "OFM_BASE2_HI"),
    (0xA58, "OFM_BASE3"),
    (0xA5C, "OFM_BASE3_HI"),
    (0xA60, "OFM_STRIDE_X"),
    (0xA64, "OFM_STRIDE_X_HI"),
    (0xA68, "OFM_STRIDE_Y"),
    (0xA6C, "OFM_STRIDE_Y_HI"),
    (0xA70, "OFM_STRIDE_C"),
    (0xA74, "OFM_STRIDE_C_HI"),
    (0xA80, "WEIGHT_BASE"),
    (0xA84, "WEIGHT_BASE_HI"),
    (0xA88, "WEIGHT_LENGTH"),
    (0xA8C, "WEIGHT_LENGTH_HI"),
    (0xA90, "SCALE_BASE"),
    (0xA94, "SCALE_BASE_HI"),
    (0xA98, "SCALE_LENGTH"),
    (0xAA0, "OFM_SCALE"),
    (0xAA4, "OFM_SCALE_SHIFT"),
    (0xAA8, "OPA_SCALE"),
    (0xAB0, "OPB_SCALE"),
    (0xAC0, "DMA0_SRC"),
    (0xAC4, "DMA0_SRC_HI"),
    (0xAC8, "DMA0_DST"),
    (0xACC, "DMA0_DST_HI"),
    (0xAD0, "DMA0_LEN"),
    (0xAD4, "DMA0_LEN_HI"),
    (0xAD8, "DMA0_SKIP0"),
    (0xADC, "DMA0_SKIP0_HI"),
    (0xAE0, "DMA0_SKIP1"),
    (0xAE4, "DMA0_SKIP1_HI"),
    (0xB00, "IFM2_BASE0"),
    (0xB04, "IFM2_BASE0_HI"),
    (0xB08, "IFM2_BASE1"),
    (0xB0C, "IFM2_BASE1_HI"),
    (0xB10, "IFM2_BASE2"),
    (0xB14, "IFM2_BASE2_HI"),
    (0xB18, "IFM2_BASE3"),
    (0xB1C, "IFM2_BASE3_HI"),
    (0xB20, "IFM2_STRIDE_X"),
    (0xB24, "IFM2_STRIDE_X_HI"),
    (0xB28, "IFM2_STRIDE_Y"),
    (0xB2C, "IFM2_STRIDE_Y_HI"),
    (0xB30, "IFM2_STRIDE_C"),
    (0xB34, "IFM2_STRIDE_C_HI"),
    (0xB40, "WEIGHT1_BASE"),
    (0xB44, "WEIGHT1_BASE_HI"),
    (0xB48, "WEIGHT1_LENGTH"),
    (0xB4C, "WEIGHT1_LENGTH_HI"),
    (0xB50, "SCALE1_BASE"),
    (0xB54, "SCALE1_BASE_HI"),
    (0xB58, "SCALE1_LENGTH"),
];

/// Single-word command opcodes.
#[rustfmt::skip]
const CMD0_NAMES: &[(u32, &str)] = &[
    (0x000, "NPU_OP_STOP"),
    (0x001, "NPU_OP_IRQ"),
    (0x002, "NPU_OP_CONV"),
    (0x003, "NPU_OP_DEPTHWISE"),
    (0x004, "NPU_OP_VECTOR_PROD"),
    (0x005, "NPU_OP_POOL"),
    (0x006, "NPU_OP_ELEMENTWISE"),
    (0x010, "NPU_OP_DMA_START"),
    (0x011, "NPU_OP_DMA_WAIT"),
    (0x012, "NPU_OP_KERNEL_WAIT"),
    (0x100, "NPU_SET_IFM_PAD_TOP"),
    (0x101, "NPU_SET_IFM_PAD_LEFT"),
    (0x102, "NPU_SET_IFM_PAD_RIGHT"),
    (0x103, "NPU_SET_IFM_PAD_BOTTOM"),
    (0x104, "NPU_SET_IFM_DEPTH_M1"),
    (0x105, "NPU_SET_IFM_PRECISION"),
    (0x107, "NPU_SET_IFM_UPSCALE"),
    (0x109, "NPU_SET_IFM_ZERO_POINT"),
    (0x10A, "NPU_SET_IFM_WIDTH0_M1"),
    (0x10B, "NPU_SET_IFM_HEIGHT0_M1"),
    (0x10C, "NPU_SET_IFM_HEIGHT1_M1"),
    (0x10D, "NPU_SET_IFM_IB_END"),
    (0x10F, "NPU_SET_IFM_REGION"),
    (0x110, "NPU_SET_OFM_BATCH_SIZE_M1"),
    (0x111, "NPU_SET_OFM_WIDTH_M1"),
    (0x112, "NPU_SET_OFM_HEIGHT_M1"),
    (0x113, "NPU_SET_OFM_DEPTH_M1"),
    (0x114, "NPU_SET_OFM_PRECISION"),
    (0x115, "NPU_SET_OFM_BLK_WIDTH_M1"),
    (0x116, "NPU_SET_OFM_BLK_HEIGHT_M1"),
    (0x117, "NPU_SET_OFM_BLK_DEPTH_M1"),
    (0x118, "NPU_SET_OFM_ZERO_POINT"),
    (0x11A, "NPU_SET_OFM_WIDTH0_M1"),
    (0x11B, "NPU_SET_OFM_HEIGHT0_M1"),
    (0x11C, "NPU_SET_OFM_HEIGHT1_M1"),
    (0x11F, "NPU_SET_OFM_REGION"),
    (0x120, "NPU_SET_KERNEL_WIDTH_M1"),
    (0x121, "NPU_SET_KERNEL_HEIGHT_M1"),
    (0x122, "NPU_SET_KERNEL_STRIDE"),
    (0x124, "NPU_SET_ACC_FORMAT"),
    (0x125, "NPU_SET_ACTIVATION"),
    (0x126, "NPU_SET_ACTIVATION_MIN"),
    (0x127, "NPU_SET_ACTIVATION_MAX"),
    (0x128, "NPU_SET_WEIGHT_REGION"),
    (0x129, "NPU_SET_SCALE_REGION"),
    (0x12D, "NPU_SET_AB_START"),
    (0x12F, "NPU_SET_BLOCKDEP"),
    (0x130, "NPU_SET_DMA0_SRC_REGION"),
    (0x131, "NPU_SET_DMA0_DST_REGION"),
    (0x180, "NPU_SET_IFM2_BROADCAST"),
    (0x181, "NPU_SET_IFM2_SCALAR"),
    (0x185, "NPU_SET_IFM2_PRECISION"),
    (0x189, "NPU_SET_IFM2_ZERO_POINT"),
    (0x18A, "NPU_SET_IFM2_WIDTH0_M1"),
    (0x18B, "NPU_SET_IFM2_HEIGHT0_M1"),
    (0x18C, "NPU_SET_IFM2_HEIGHT1_M1"),
    (0x18D, "NPU_SET_IFM2_IB_START"),
    (0x18F, "NPU_SET_IFM2_REGION"),
];

/// Two-word command opcodes (payload in the following word).
#[rustfmt::skip]
const CMD1_NAMES: &[(u32, &str)] = &[
    (0x000, "NPU_SET_IFM_BASE0"),
    (0x001, "NPU_SET_IFM_BASE1"),
    (0x002, "NPU_SET_IFM_BASE2"),
    (0x003, "NPU_SET_IFM_BASE3"),
    (0x004, "NPU_SET_IFM_STRIDE_X"),
    (0x005, "NPU_SET_IFM_STRIDE_Y"),
    (0x006, "NPU_SET_IFM_STRIDE_C"),
    (0x007, "NPU_SET_IFM_STRIDE_N"),
    (0x010, "NPU_SET_OFM_BASE0"),
    (0x011, "NPU_SET_OFM_BASE1"),
    (0x012, "NPU_SET_OFM_BASE2"),
    (0x013, "NPU_SET_OFM_BASE3"),
    (0x014, "NPU_SET_OFM_STRIDE_X"),
    (0x015, "NPU_SET_OFM_STRIDE_Y"),
    (0x016, "NPU_SET_OFM_STRIDE_C"),
    (0x017, "NPU_SET_OFM_STRIDE_N"),
    (0x020, "NPU_SET_WEIGHT_BASE"),
    (0x021, "NPU_SET_WEIGHT_LENGTH"),
    (0x022, "NPU_SET_SCALE_BASE"),
    (0x023, "NPU_SET_SCALE_LENGTH"),
    (0x024, "NPU_SET_OFM_SCALE"),
    (0x025, "NPU_SET_OPA_SCALE"),
    (0x026, "NPU_SET_OPB_SCALE"),
    (0x030, "NPU_SET_DMA0_SRC"),
    (0x031, "NPU_SET_DMA0_DST"),
    (0x032, "NPU_SET_DMA0_LEN"),
    (0x080, "NPU_SET_IFM2_BASE0"),
    (0x081, "NPU_SET_IFM2_BASE1"),
    (0x082, "NPU_SET_IFM2_BASE2"),
    (0x083, "NPU_SET_IFM2_BASE3"),
    (0x084, "NPU_SET_IFM2_STRIDE_X"),
    (0x085, "NPU_SET_IFM2_STRIDE_Y"),
    (0x086, "NPU_SET_IFM2_STRIDE_C"),
];
