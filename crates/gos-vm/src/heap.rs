//! Flat byte-addressed heap holding every runtime value as a tagged node.
//!
//! The heap is a fixed-capacity array of 8-byte big-endian words. A node is
//! one header word followed by zero or more child words:
//!
//! ```text
//! byte 0      tag
//! bytes 1-4   payload (tag dependent)
//! bytes 5-6   size of the node in words, header included
//! byte 7      unused
//! ```
//!
//! Allocation bumps a free pointer and never reclaims, so an [`Addr`] stays
//! valid for the lifetime of the heap.

use core::fmt;

use hashbrown::HashMap;
use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::error::{HeapError, VmError, VmResult};

pub const WORD_SIZE: usize = 8;
pub const DEFAULT_HEAP_BYTES: usize = 1_000_000;

const SIZE_OFFSET: usize = 5;

/// Child word stored in a channel's dormant slot when no routine is parked.
const NO_ROUTINE: u64 = u64::MAX;

// =============================================================================
// Addresses and tags
// =============================================================================

/// Word index of a node in the heap.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Addr(u32);

impl Addr {
    #[inline]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    const fn from_word(word: u64) -> Self {
        Self(word as u32)
    }

    #[inline]
    const fn to_word(self) -> u64 {
        self.0 as u64
    }
}

impl fmt::Debug for Addr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Addr({})", self.0)
    }
}

impl fmt::Display for Addr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
pub enum Tag {
    False = 0,
    True,
    Number,
    Null,
    Unassigned,
    Undefined,
    Blockframe,
    Callframe,
    Closure,
    Frame,
    Environment,
    Pair,
    Builtin,
    String,
    Channel,
}

// Canonical singletons, allocated first by `Heap::new`.
pub const FALSE: Addr = Addr(0);
pub const TRUE: Addr = Addr(1);
pub const NULL: Addr = Addr(2);
pub const UNASSIGNED: Addr = Addr(3);
pub const UNDEFINED: Addr = Addr(4);

/// Compile-time resolved location of a name: frame index, then slot index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Position {
    pub frame: u16,
    pub slot: u16,
}

impl Position {
    pub const fn new(frame: u16, slot: u16) -> Self {
        Self { frame, slot }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.frame, self.slot)
    }
}

/// djb2 over UTF-16 code units, wrapping at 32 bits.
pub fn hash_string(s: &str) -> u32 {
    s.encode_utf16().fold(5381u32, |hash, unit| {
        hash.wrapping_shl(5)
            .wrapping_add(hash)
            .wrapping_add(unit as u32)
    })
}

// =============================================================================
// Heap
// =============================================================================

pub struct Heap {
    data: Vec<u8>,
    /// Next free word.
    free: usize,
    capacity: usize,
    /// hash -> every (node address, text) sharing that hash
    strings: HashMap<u32, Vec<(Addr, String)>>,
}

impl Heap {
    /// Create a heap of `bytes` bytes and allocate the canonical singletons.
    pub fn new(bytes: usize) -> Result<Self, HeapError> {
        if bytes % WORD_SIZE != 0 {
            return Err(HeapError::Misaligned(bytes));
        }
        if bytes / WORD_SIZE > u32::MAX as usize {
            return Err(HeapError::TooLarge(bytes));
        }
        let mut heap = Self {
            data: vec![0; bytes],
            free: 0,
            capacity: bytes / WORD_SIZE,
            strings: HashMap::new(),
        };
        for tag in [Tag::False, Tag::True, Tag::Null, Tag::Unassigned, Tag::Undefined] {
            heap.allocate(tag, 1)?;
        }
        debug_assert_eq!(heap.free, UNDEFINED.index() + 1);
        Ok(heap)
    }

    /// Words allocated so far.
    pub fn used_words(&self) -> usize {
        self.free
    }

    pub fn capacity_words(&self) -> usize {
        self.capacity
    }

    /// Bump-allocate a node of `size` words (header included).
    pub fn allocate(&mut self, tag: Tag, size: usize) -> Result<Addr, HeapError> {
        if size > u16::MAX as usize || self.free + size > self.capacity {
            return Err(HeapError::OutOfMemory {
                requested: size,
                free: self.free,
                capacity: self.capacity,
            });
        }
        let addr = Addr(self.free as u32);
        self.free += size;
        self.set_byte(addr, 0, tag.into());
        self.set_u16(addr, SIZE_OFFSET, size as u16);
        Ok(addr)
    }

    // === Raw word access ===

    #[inline]
    fn offset(addr: Addr) -> usize {
        addr.index() * WORD_SIZE
    }

    pub fn word(&self, addr: Addr) -> u64 {
        let off = Self::offset(addr);
        let mut buf = [0u8; WORD_SIZE];
        buf.copy_from_slice(&self.data[off..off + WORD_SIZE]);
        u64::from_be_bytes(buf)
    }

    pub fn set_word(&mut self, addr: Addr, word: u64) {
        let off = Self::offset(addr);
        self.data[off..off + WORD_SIZE].copy_from_slice(&word.to_be_bytes());
    }

    pub fn byte(&self, addr: Addr, offset: usize) -> u8 {
        self.data[Self::offset(addr) + offset]
    }

    pub fn set_byte(&mut self, addr: Addr, offset: usize, value: u8) {
        self.data[Self::offset(addr) + offset] = value;
    }

    pub fn u16_at(&self, addr: Addr, offset: usize) -> u16 {
        let off = Self::offset(addr) + offset;
        u16::from_be_bytes([self.data[off], self.data[off + 1]])
    }

    pub fn set_u16(&mut self, addr: Addr, offset: usize, value: u16) {
        let off = Self::offset(addr) + offset;
        self.data[off..off + 2].copy_from_slice(&value.to_be_bytes());
    }

    pub fn u32_at(&self, addr: Addr, offset: usize) -> u32 {
        let off = Self::offset(addr) + offset;
        let mut buf = [0u8; 4];
        buf.copy_from_slice(&self.data[off..off + 4]);
        u32::from_be_bytes(buf)
    }

    pub fn set_u32(&mut self, addr: Addr, offset: usize, value: u32) {
        let off = Self::offset(addr) + offset;
        self.data[off..off + 4].copy_from_slice(&value.to_be_bytes());
    }

    // === Node header ===

    pub fn tag(&self, addr: Addr) -> Result<Tag, HeapError> {
        let byte = self.byte(addr, 0);
        Tag::try_from(byte).map_err(|_| HeapError::InvalidTag { addr, byte })
    }

    #[inline]
    pub fn is(&self, addr: Addr, tag: Tag) -> bool {
        self.byte(addr, 0) == tag as u8
    }

    pub fn size(&self, addr: Addr) -> usize {
        self.u16_at(addr, SIZE_OFFSET) as usize
    }

    /// Number nodes carry one raw data word and no children.
    pub fn child_count(&self, addr: Addr) -> usize {
        if self.is(addr, Tag::Number) {
            0
        } else {
            self.size(addr).saturating_sub(1)
        }
    }

    // === Children ===

    pub fn child_word(&self, addr: Addr, index: usize) -> u64 {
        self.word(Addr(addr.0 + 1 + index as u32))
    }

    pub fn set_child_word(&mut self, addr: Addr, index: usize, word: u64) {
        self.set_word(Addr(addr.0 + 1 + index as u32), word);
    }

    pub fn child(&self, addr: Addr, index: usize) -> Addr {
        Addr::from_word(self.child_word(addr, index))
    }

    pub fn set_child(&mut self, addr: Addr, index: usize, value: Addr) {
        self.set_child_word(addr, index, value.to_word());
    }

    // === Booleans and other singletons ===

    pub fn is_boolean(&self, addr: Addr) -> bool {
        self.is(addr, Tag::True) || self.is(addr, Tag::False)
    }

    pub fn boolean(&self, b: bool) -> Addr {
        if b {
            TRUE
        } else {
            FALSE
        }
    }

    // === Number ===
    // [tag, unused.., size=2] followed by the f64 bits

    pub fn alloc_number(&mut self, n: f64) -> Result<Addr, HeapError> {
        let addr = self.allocate(Tag::Number, 2)?;
        self.set_word(Addr(addr.0 + 1), n.to_bits());
        Ok(addr)
    }

    pub fn number_value(&self, addr: Addr) -> f64 {
        f64::from_bits(self.word(Addr(addr.0 + 1)))
    }

    // === String ===
    // [tag, 4 byte hash into the string pool, size=1]
    // Texts with equal hashes share a pool bucket and are told apart by address.

    /// Intern `text`: equal text always yields the same address.
    pub fn alloc_string(&mut self, text: &str) -> Result<Addr, HeapError> {
        let hash = hash_string(text);
        let found = self
            .strings
            .get(&hash)
            .and_then(|bucket| bucket.iter().find(|(_, t)| t == text));
        if let Some((addr, _)) = found {
            return Ok(*addr);
        }
        let addr = self.allocate(Tag::String, 1)?;
        self.set_u32(addr, 1, hash);
        self.strings
            .entry(hash)
            .or_default()
            .push((addr, text.to_string()));
        Ok(addr)
    }

    pub fn string_hash(&self, addr: Addr) -> u32 {
        self.u32_at(addr, 1)
    }

    pub fn string_value(&self, addr: Addr) -> Result<&str, HeapError> {
        self.strings
            .get(&self.string_hash(addr))
            .and_then(|bucket| bucket.iter().find(|(a, _)| *a == addr))
            .map(|(_, text)| text.as_str())
            .ok_or(HeapError::DanglingString(addr))
    }

    pub fn interned_count(&self) -> usize {
        self.strings.values().map(Vec::len).sum()
    }

    // === Builtin ===
    // [tag, 1 byte id, 3 bytes unused, size=1]

    pub fn alloc_builtin(&mut self, id: u8) -> Result<Addr, HeapError> {
        let addr = self.allocate(Tag::Builtin, 1)?;
        self.set_byte(addr, 1, id);
        Ok(addr)
    }

    pub fn builtin_id(&self, addr: Addr) -> u8 {
        self.byte(addr, 1)
    }

    // === Closure ===
    // [tag, 1 byte arity, 2 bytes pc, 1 byte unused, size=2] followed by env

    pub fn alloc_closure(&mut self, arity: u8, pc: u16, env: Addr) -> Result<Addr, HeapError> {
        let addr = self.allocate(Tag::Closure, 2)?;
        self.set_byte(addr, 1, arity);
        self.set_u16(addr, 2, pc);
        self.set_child(addr, 0, env);
        Ok(addr)
    }

    pub fn closure_arity(&self, addr: Addr) -> u8 {
        self.byte(addr, 1)
    }

    pub fn closure_pc(&self, addr: Addr) -> u16 {
        self.u16_at(addr, 2)
    }

    pub fn closure_env(&self, addr: Addr) -> Addr {
        self.child(addr, 0)
    }

    // === Blockframe ===
    // [tag, unused.., size=2] followed by the saved env

    pub fn alloc_blockframe(&mut self, env: Addr) -> Result<Addr, HeapError> {
        let addr = self.allocate(Tag::Blockframe, 2)?;
        self.set_child(addr, 0, env);
        Ok(addr)
    }

    pub fn blockframe_env(&self, addr: Addr) -> Addr {
        self.child(addr, 0)
    }

    // === Callframe ===
    // [tag, 1 byte go flag, 2 bytes pc, 1 byte unused, size=2] followed by env

    pub fn alloc_callframe(&mut self, env: Addr, pc: u16) -> Result<Addr, HeapError> {
        self.alloc_callframe_with(env, pc, false)
    }

    /// Control frame at the bottom of a spawned goroutine's RTS.
    pub fn alloc_go_callframe(&mut self, env: Addr, pc: u16) -> Result<Addr, HeapError> {
        self.alloc_callframe_with(env, pc, true)
    }

    fn alloc_callframe_with(&mut self, env: Addr, pc: u16, is_go: bool) -> Result<Addr, HeapError> {
        let addr = self.allocate(Tag::Callframe, 2)?;
        self.set_byte(addr, 1, is_go as u8);
        self.set_u16(addr, 2, pc);
        self.set_child(addr, 0, env);
        Ok(addr)
    }

    pub fn callframe_env(&self, addr: Addr) -> Addr {
        self.child(addr, 0)
    }

    pub fn callframe_pc(&self, addr: Addr) -> u16 {
        self.u16_at(addr, 2)
    }

    pub fn is_go_callframe(&self, addr: Addr) -> bool {
        self.is(addr, Tag::Callframe) && self.byte(addr, 1) == 1
    }

    // === Frame ===
    // [tag, unused.., size=n+1] followed by n value slots

    /// Allocate a frame of `slots` values, each initialized to Unassigned.
    pub fn alloc_frame(&mut self, slots: usize) -> Result<Addr, HeapError> {
        let addr = self.allocate(Tag::Frame, slots + 1)?;
        for i in 0..slots {
            self.set_child(addr, i, UNASSIGNED);
        }
        Ok(addr)
    }

    // === Environment ===
    // [tag, unused.., size=n+1] followed by n frame addresses, innermost last

    pub fn alloc_environment(&mut self, frames: usize) -> Result<Addr, HeapError> {
        self.allocate(Tag::Environment, frames + 1)
    }

    /// New environment one frame longer than `env`. `env` is left untouched,
    /// so closures holding it keep seeing the shorter scope chain.
    pub fn environment_extend(&mut self, env: Addr, frame: Addr) -> Result<Addr, HeapError> {
        let frames = self.child_count(env);
        let extended = self.alloc_environment(frames + 1)?;
        for i in 0..frames {
            let f = self.child(env, i);
            self.set_child(extended, i, f);
        }
        self.set_child(extended, frames, frame);
        Ok(extended)
    }

    /// Shallow copy: a new frame-address list sharing the same frames.
    pub fn environment_copy(&mut self, env: Addr) -> Result<Addr, HeapError> {
        let frames = self.child_count(env);
        let copy = self.alloc_environment(frames)?;
        for i in 0..frames {
            let f = self.child(env, i);
            self.set_child(copy, i, f);
        }
        Ok(copy)
    }

    fn frame_at(&self, env: Addr, pos: Position) -> VmResult<Addr> {
        let out_of_range = VmError::PositionOutOfRange {
            frame: pos.frame,
            slot: pos.slot,
        };
        if pos.frame as usize >= self.child_count(env) {
            return Err(out_of_range);
        }
        let frame = self.child(env, pos.frame as usize);
        if !self.is(frame, Tag::Frame) || pos.slot as usize >= self.child_count(frame) {
            return Err(out_of_range);
        }
        Ok(frame)
    }

    pub fn environment_value(&self, env: Addr, pos: Position) -> VmResult<Addr> {
        let frame = self.frame_at(env, pos)?;
        Ok(self.child(frame, pos.slot as usize))
    }

    pub fn set_environment_value(&mut self, env: Addr, pos: Position, value: Addr) -> VmResult<()> {
        let frame = self.frame_at(env, pos)?;
        self.set_child(frame, pos.slot as usize, value);
        Ok(())
    }

    // === Pair ===
    // [tag, unused.., size=3] followed by head and tail

    pub fn alloc_pair(&mut self, head: Addr, tail: Addr) -> Result<Addr, HeapError> {
        let addr = self.allocate(Tag::Pair, 3)?;
        self.set_child(addr, 0, head);
        self.set_child(addr, 1, tail);
        Ok(addr)
    }

    pub fn pair_head(&self, addr: Addr) -> Addr {
        self.child(addr, 0)
    }

    pub fn pair_tail(&self, addr: Addr) -> Addr {
        self.child(addr, 1)
    }

    pub fn set_pair_head(&mut self, addr: Addr, value: Addr) {
        self.set_child(addr, 0, value);
    }

    pub fn set_pair_tail(&mut self, addr: Addr, value: Addr) {
        self.set_child(addr, 1, value);
    }

    // === Channel ===
    // [tag, 1 byte read flag, 1 byte write flag, 2 bytes unused, size=3]
    // followed by the payload and the dormant routine id

    pub fn alloc_channel(&mut self) -> Result<Addr, HeapError> {
        let addr = self.allocate(Tag::Channel, 3)?;
        self.set_byte(addr, 1, 0);
        self.set_byte(addr, 2, 0);
        self.set_child(addr, 0, UNDEFINED);
        self.set_child_word(addr, 1, NO_ROUTINE);
        Ok(addr)
    }

    pub fn channel_is_read(&self, chan: Addr) -> bool {
        self.byte(chan, 1) == 1
    }

    pub fn channel_is_written(&self, chan: Addr) -> bool {
        self.byte(chan, 2) == 1
    }

    pub fn set_channel_read(&mut self, chan: Addr) {
        self.set_byte(chan, 1, 1);
    }

    /// Store the payload and raise the write flag.
    pub fn write_channel(&mut self, chan: Addr, value: Addr) {
        self.set_child(chan, 0, value);
        self.set_byte(chan, 2, 1);
    }

    pub fn channel_value(&self, chan: Addr) -> Addr {
        self.child(chan, 0)
    }

    pub fn channel_dormant(&self, chan: Addr) -> Option<u32> {
        match self.child_word(chan, 1) {
            NO_ROUTINE => None,
            id => Some(id as u32),
        }
    }

    pub fn set_channel_dormant(&mut self, chan: Addr, routine: Option<u32>) {
        let word = routine.map_or(NO_ROUTINE, |id| id as u64);
        self.set_child_word(chan, 1, word);
    }

    /// Return the channel to its idle state after a completed exchange.
    pub fn reset_channel(&mut self, chan: Addr) {
        self.set_byte(chan, 1, 0);
        self.set_byte(chan, 2, 0);
        self.set_child(chan, 0, UNDEFINED);
        self.set_child_word(chan, 1, NO_ROUTINE);
    }
}

impl fmt::Debug for Heap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Heap")
            .field("used_words", &self.free)
            .field("capacity_words", &self.capacity)
            .field("interned", &self.strings.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn heap() -> Heap {
        Heap::new(4096).unwrap()
    }

    #[test]
    fn test_singletons_are_canonical() {
        let h = heap();
        assert!(h.is(FALSE, Tag::False));
        assert!(h.is(TRUE, Tag::True));
        assert!(h.is(NULL, Tag::Null));
        assert!(h.is(UNASSIGNED, Tag::Unassigned));
        assert!(h.is(UNDEFINED, Tag::Undefined));
        assert_eq!(h.used_words(), 5);
        assert_eq!(h.boolean(true), TRUE);
    }

    #[test]
    fn test_misaligned_heap_rejected() {
        assert_eq!(Heap::new(12).unwrap_err(), HeapError::Misaligned(12));
    }

    #[test]
    fn test_header_layout() {
        let mut h = heap();
        let closure = h.alloc_closure(3, 0x1234, UNDEFINED).unwrap();
        assert_eq!(h.size(closure), 2);
        assert_eq!(h.child_count(closure), 1);
        assert_eq!(h.closure_arity(closure), 3);
        assert_eq!(h.closure_pc(closure), 0x1234);
        assert_eq!(h.closure_env(closure), UNDEFINED);
        // tag in byte 0, size in bytes 5-6
        let header = h.word(closure).to_be_bytes();
        assert_eq!(header[0], Tag::Closure as u8);
        assert_eq!(u16::from_be_bytes([header[5], header[6]]), 2);
    }

    #[test]
    fn test_number_has_no_children() {
        let mut h = heap();
        let n = h.alloc_number(2.5).unwrap();
        assert_eq!(h.child_count(n), 0);
        assert_eq!(h.number_value(n), 2.5);
    }

    #[test]
    fn test_string_interning() {
        let mut h = heap();
        let a = h.alloc_string("hello").unwrap();
        let b = h.alloc_string("hello").unwrap();
        let c = h.alloc_string("world").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(h.string_value(a).unwrap(), "hello");
        assert_eq!(h.string_hash(a), hash_string("hello"));
        assert_eq!(h.interned_count(), 2);
    }

    #[test]
    fn test_colliding_strings_stay_distinct() {
        let mut h = heap();
        assert_eq!(hash_string("Ba"), hash_string("C@"));
        let a = h.alloc_string("Ba").unwrap();
        let b = h.alloc_string("C@").unwrap();
        assert_ne!(a, b);
        assert_eq!(h.string_hash(a), h.string_hash(b));
        assert_eq!(h.string_value(a).unwrap(), "Ba");
        assert_eq!(h.string_value(b).unwrap(), "C@");
        assert_eq!(h.alloc_string("C@").unwrap(), b);
        assert_eq!(h.interned_count(), 2);
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn test_heap_beyond_word_addresses_rejected() {
        let bytes = (u32::MAX as usize + 1) * WORD_SIZE;
        assert_eq!(Heap::new(bytes).unwrap_err(), HeapError::TooLarge(bytes));
    }

    #[test]
    fn test_hash_matches_djb2() {
        assert_eq!(hash_string(""), 5381);
        assert_eq!(hash_string("a"), 5381 * 33 + 97);
    }

    #[test]
    fn test_environment_extend_is_persistent() {
        let mut h = heap();
        let empty = h.alloc_environment(0).unwrap();
        let f1 = h.alloc_frame(1).unwrap();
        let e1 = h.environment_extend(empty, f1).unwrap();
        let f2 = h.alloc_frame(2).unwrap();
        let e2 = h.environment_extend(e1, f2).unwrap();
        assert_eq!(h.child_count(empty), 0);
        assert_eq!(h.child_count(e1), 1);
        assert_eq!(h.child_count(e2), 2);
        assert_eq!(h.child(e2, 0), f1);
        assert_eq!(h.child(e2, 1), f2);
    }

    #[test]
    fn test_frame_slots_start_unassigned() {
        let mut h = heap();
        let empty = h.alloc_environment(0).unwrap();
        let f = h.alloc_frame(2).unwrap();
        let env = h.environment_extend(empty, f).unwrap();
        let pos = Position::new(0, 1);
        assert_eq!(h.environment_value(env, pos).unwrap(), UNASSIGNED);
        h.set_environment_value(env, pos, TRUE).unwrap();
        assert_eq!(h.environment_value(env, pos).unwrap(), TRUE);
        assert_eq!(
            h.environment_value(env, Position::new(0, 2)),
            Err(VmError::PositionOutOfRange { frame: 0, slot: 2 })
        );
        assert_eq!(
            h.environment_value(env, Position::new(1, 0)),
            Err(VmError::PositionOutOfRange { frame: 1, slot: 0 })
        );
    }

    #[test]
    fn test_channel_flags() {
        let mut h = heap();
        let ch = h.alloc_channel().unwrap();
        assert!(!h.channel_is_read(ch));
        assert!(!h.channel_is_written(ch));
        assert_eq!(h.channel_dormant(ch), None);
        h.write_channel(ch, TRUE);
        h.set_channel_read(ch);
        h.set_channel_dormant(ch, Some(7));
        assert!(h.channel_is_written(ch) && h.channel_is_read(ch));
        assert_eq!(h.channel_value(ch), TRUE);
        assert_eq!(h.channel_dormant(ch), Some(7));
        h.reset_channel(ch);
        assert!(!h.channel_is_written(ch));
        assert_eq!(h.channel_dormant(ch), None);
    }

    #[test]
    fn test_go_callframe_flag() {
        let mut h = heap();
        let normal = h.alloc_callframe(UNDEFINED, 9).unwrap();
        let go = h.alloc_go_callframe(UNDEFINED, 0).unwrap();
        assert!(!h.is_go_callframe(normal));
        assert!(h.is_go_callframe(go));
        assert_eq!(h.callframe_pc(normal), 9);
    }

    #[test]
    fn test_out_of_memory_is_reported() {
        let mut h = Heap::new(8 * 8).unwrap();
        h.alloc_number(1.0).unwrap();
        let err = h.alloc_number(2.0).unwrap_err();
        assert_eq!(
            err,
            HeapError::OutOfMemory {
                requested: 2,
                free: 7,
                capacity: 8
            }
        );
        // the failed allocation must not move the free pointer
        assert_eq!(h.used_words(), 7);
    }
}
