//! Services announcement payload
//!
//! An announcement payload is a sequence of little-endian 32-bit words:
//!
//! ```text
//! [generation word][service class 1][service class 2]...[service class N]
//! ```
//!
//! The word at position `i` (for `i >= 1`) describes the service at service
//! index `i` on the announcing device.

use crate::error::{ProtocolError, Result};
use crate::types::{GenerationWord, ServiceClass, ServiceIndex};
use byteorder::{ByteOrder, LittleEndian};

/// Maximum number of words (generation word included) addressable by a `ServiceIndex`
pub const MAX_SERVICE_WORDS: usize = u8::MAX as usize + 1;

/// Decoded service list of one device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceAnnouncement {
    words: Vec<u32>,
}

impl ServiceAnnouncement {
    /// Build an announcement from a generation word and ordered service classes
    pub fn new(generation: GenerationWord, services: &[ServiceClass]) -> Self {
        let mut words = Vec::with_capacity(services.len() + 1);
        words.push(generation.0);
        words.extend(services.iter().map(|class| class.0));
        Self { words }
    }

    /// Build an announcement from raw words (generation word first)
    pub fn from_words(words: Vec<u32>) -> Result<Self> {
        if words.is_empty() {
            return Err(ProtocolError::MalformedAnnouncement { len: 0 });
        }
        if words.len() > MAX_SERVICE_WORDS {
            return Err(ProtocolError::TooManyServices {
                count: words.len(),
                max: MAX_SERVICE_WORDS,
            });
        }
        Ok(Self { words })
    }

    /// Decode an announcement payload
    ///
    /// Rejects empty payloads, payloads that are not a whole number of words,
    /// and lists too long to be addressed by a service index.
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.is_empty() || data.len() % 4 != 0 {
            return Err(ProtocolError::MalformedAnnouncement { len: data.len() });
        }

        let words = data.chunks_exact(4).map(LittleEndian::read_u32).collect();
        Self::from_words(words)
    }

    /// Encode to the little-endian wire payload
    pub fn encode(&self) -> Vec<u8> {
        let mut data = vec![0u8; self.words.len() * 4];
        LittleEndian::write_u32_into(&self.words, &mut data);
        data
    }

    pub fn generation(&self) -> GenerationWord {
        GenerationWord(self.words[0])
    }

    /// Replace the generation word, leaving services untouched
    pub fn set_generation(&mut self, generation: GenerationWord) {
        self.words[0] = generation.0;
    }

    /// Number of words, generation word included
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// Always false: the generation word is mandatory
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Number of announced services (excludes the generation word)
    pub fn service_count(&self) -> usize {
        self.words.len() - 1
    }

    /// Raw words, generation word first
    pub fn words(&self) -> &[u32] {
        &self.words
    }

    /// Service class at `index`, if the index names a service slot
    pub fn service_class(&self, index: ServiceIndex) -> Option<ServiceClass> {
        match index.0 {
            0 => None,
            i => self.words.get(usize::from(i)).copied().map(ServiceClass),
        }
    }

    /// Announced services in service-index order
    pub fn services(&self) -> impl Iterator<Item = (ServiceIndex, ServiceClass)> + '_ {
        self.words
            .iter()
            .enumerate()
            .skip(1)
            .map(|(i, word)| (ServiceIndex(i as u8), ServiceClass(*word)))
    }

    /// First service index offering `class`
    pub fn find(&self, class: ServiceClass) -> Option<ServiceIndex> {
        self.services()
            .find(|(_, offered)| *offered == class)
            .map(|(index, _)| index)
    }

    /// Whether both lists announce the same classes at the same indices
    pub fn same_services(&self, other: &ServiceAnnouncement) -> bool {
        self.words[1..] == other.words[1..]
    }
}
