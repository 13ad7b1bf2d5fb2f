use super::id::SlotInfo;

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct BufferInfo {
    pub slot: SlotInfo,
    pub update_frame_index: u32,
    pub append_frame_index: u32,
    pub append_pos: usize,
    pub append_overflow: bool,
    pub num_slots: usize,
    pub active_slot: usize,
}

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct ImageInfo {
    pub slot: SlotInfo,
    pub update_frame_index: u32,
    pub num_slots: usize,
    pub active_slot: usize,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct ShaderInfo {
    pub slot: SlotInfo,
}

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct PipelineInfo {
    pub slot: SlotInfo,
}

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct PassInfo {
    pub slot: SlotInfo,
}
