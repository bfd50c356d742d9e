use bytemuck::Pod;

use crate::dsp::DType;

/// Input side of a block: a byte queue tagged with its element type.
#[derive(Debug)]
pub struct InputPort {
    index: usize,
    dtype: DType,
    bytes: Vec<u8>,
    reserve: usize,
    consume_calls: usize,
    total_consumed: u64,
}

impl InputPort {
    pub fn new(index: usize, dtype: DType) -> Self {
        Self {
            index,
            dtype,
            bytes: Vec::new(),
            reserve: 0,
            consume_calls: 0,
            total_consumed: 0,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    /// Whole elements currently buffered.
    pub fn elements(&self) -> usize {
        match self.dtype.size() {
            0 => 0,
            size => self.bytes.len() / size,
        }
    }

    /// Raw view of the buffered elements, oldest first.
    pub fn buffer(&self) -> &[u8] {
        &self.bytes[..self.elements() * self.dtype.size()]
    }

    /// Raw view of elements `[start, start + count)`.
    pub fn window(&self, start: usize, count: usize) -> &[u8] {
        let size = self.dtype.size();
        let end = (start + count).min(self.elements());
        let start = start.min(end);
        &self.bytes[start * size..end * size]
    }

    pub fn consume(&mut self, elements: usize) {
        let elements = elements.min(self.elements());
        self.bytes.drain(..elements * self.dtype.size());
        self.consume_calls += 1;
        self.total_consumed += elements as u64;
    }

    pub fn reserve(&self) -> usize {
        self.reserve
    }

    pub fn set_reserve(&mut self, elements: usize) {
        self.reserve = elements;
    }

    pub fn push_raw(&mut self, raw: &[u8]) {
        self.bytes.extend_from_slice(raw);
    }

    pub fn push<T: Pod>(&mut self, values: &[T]) {
        self.push_raw(bytemuck::cast_slice(values));
    }

    pub fn total_consumed(&self) -> u64 {
        self.total_consumed
    }

    /// Number of `consume` calls since the last cycle began.
    pub fn consume_calls(&self) -> usize {
        self.consume_calls
    }

    fn begin_cycle(&mut self) {
        self.consume_calls = 0;
    }
}

/// The set of inputs a block reads from, indexed by port number.
#[derive(Debug, Default)]
pub struct InputPorts {
    ports: Vec<InputPort>,
}

impl InputPorts {
    pub fn from_dtypes(dtypes: &[DType]) -> Self {
        Self {
            ports: dtypes
                .iter()
                .enumerate()
                .map(|(index, &dtype)| InputPort::new(index, dtype))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.ports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&InputPort> {
        self.ports.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut InputPort> {
        self.ports.get_mut(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &InputPort> {
        self.ports.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut InputPort> {
        self.ports.iter_mut()
    }

    pub fn dtypes(&self) -> Vec<DType> {
        self.ports.iter().map(InputPort::dtype).collect()
    }

    /// Fewest elements available on any port this cycle.
    pub fn min_elements(&self) -> usize {
        self.ports.iter().map(InputPort::elements).min().unwrap_or(0)
    }

    /// True once every port holds at least its reserve (and at least one element).
    pub fn ready(&self) -> bool {
        !self.ports.is_empty()
            && self
                .ports
                .iter()
                .all(|port| port.elements() >= port.reserve().max(1))
    }

    pub fn begin_cycle(&mut self) {
        for port in &mut self.ports {
            port.begin_cycle();
        }
    }
}
