//! Splitting packets into encrypted wire fragments.

use crate::error::CapacityError;
use crate::fragment::{
    CorrelationId, Fragment, HEADER_FRAGMENT_INDEX, MAX_FRAGMENT_PAYLOAD, MICRO_HEADER_SIZE,
};
use crate::scheme::EncryptionScheme;
use crate::UPacketsError;
use bush_crypto::{ecies, PublicKey, SessionSigner};
use bush_wire::Packet;
use bytes::Bytes;
use tracing::debug;

/// Turns packets into a header fragment followed by body fragments
#[derive(Debug, Clone)]
pub struct Fragmenter {
    max_fragment_size: usize,
}

impl Fragmenter {
    /// Create a fragmenter bounded by `max_fragment_size` (micro-header included)
    pub fn new(max_fragment_size: usize) -> Self {
        Self { max_fragment_size }
    }

    /// Configured maximum fragment size
    pub fn max_fragment_size(&self) -> usize {
        self.max_fragment_size
    }

    /// Body bytes carried by each body fragment
    pub fn chunk_size(&self) -> usize {
        self.max_fragment_size
            .saturating_sub(MICRO_HEADER_SIZE)
            .min(MAX_FRAGMENT_PAYLOAD)
    }

    /// Build `packet`, encrypt its header for `header_key` and its body with
    /// `scheme`, and split everything into wire fragments.
    ///
    /// The body is encrypted and chunked first so that a data packet's
    /// header can declare its fragment count before it is signed. Nothing is
    /// returned unless every fragment fits `max_fragment_size`.
    pub async fn fragment(
        &self,
        scheme: EncryptionScheme,
        packet: &mut Packet,
        signer: &dyn SessionSigner,
        header_key: &PublicKey,
        body_key: &[u8],
    ) -> Result<Vec<Bytes>, UPacketsError> {
        let body_key = scheme.body_key(body_key)?;

        let chunk_size = self.chunk_size();
        if chunk_size == 0 {
            return Err(CapacityError::FragmentTooLarge {
                size: MICRO_HEADER_SIZE + 1,
                max: self.max_fragment_size,
            }
            .into());
        }

        let body = match packet {
            Packet::Data(data) => {
                let ciphertext = body_key
                    .encrypt(data.data())
                    .map_err(UPacketsError::Encrypt)?;
                let count = ciphertext.len().div_ceil(chunk_size);
                let declared = u32::try_from(count)
                    .map_err(|_| CapacityError::TooManyFragments(count))?;
                data.set_fragment_count(declared);
                Some(Bytes::from(ciphertext))
            }
            _ => None,
        };

        let raw = packet.build(signer).await?;
        let encrypted_header =
            ecies::encrypt(header_key, &raw.header).map_err(UPacketsError::Encrypt)?;

        let header_fragment_size = MICRO_HEADER_SIZE + encrypted_header.len();
        if header_fragment_size > self.max_fragment_size
            || encrypted_header.len() > MAX_FRAGMENT_PAYLOAD
        {
            return Err(CapacityError::FragmentTooLarge {
                size: header_fragment_size,
                max: self.max_fragment_size,
            }
            .into());
        }

        let identity = packet.identity();
        let body_fragments = body.as_ref().map_or(0, |b| b.len().div_ceil(chunk_size));
        let mut fragments = Vec::with_capacity(1 + body_fragments);
        fragments.push(
            Fragment {
                correlation: CorrelationId::provisional(scheme, identity.timestamp),
                index: HEADER_FRAGMENT_INDEX,
                payload: Bytes::from(encrypted_header),
            }
            .encode(),
        );

        if let Some(body) = body {
            let correlation =
                CorrelationId::canonical(scheme, identity.timestamp, &identity.master_address);
            let mut offset = 0;
            let mut index = HEADER_FRAGMENT_INDEX;
            while offset < body.len() {
                let end = usize::min(offset + chunk_size, body.len());
                index += 1;
                fragments.push(
                    Fragment {
                        correlation,
                        index,
                        payload: body.slice(offset..end),
                    }
                    .encode(),
                );
                offset = end;
            }
            debug!(
                "fragmented {} packet into header + {} body fragments ({})",
                packet.kind(),
                index,
                correlation
            );
        } else {
            debug!("fragmented {} packet into header fragment", packet.kind());
        }

        Ok(fragments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CapacityError;
    use bush_crypto::KeyPair;
    use bush_wire::{DataPacket, Identity, PingPacket};

    fn identity(master: &KeyPair, session: &KeyPair) -> Identity {
        Identity::new(
            master.address(),
            KeyPair::generate().address(),
            master.endorse(session.public_key()).unwrap(),
            1_700_000_000_000,
        )
    }

    #[tokio::test]
    async fn test_data_fragment_count_is_stamped() {
        let master = KeyPair::generate();
        let session = KeyPair::generate();
        let peer = KeyPair::generate();
        let mut packet: Packet =
            DataPacket::new(identity(&master, &session), "Store", vec![7u8; 2000])
                .unwrap()
                .into();

        let fragmenter = Fragmenter::new(550);
        let fragments = fragmenter
            .fragment(
                EncryptionScheme::None,
                &mut packet,
                &session,
                peer.public_key(),
                &[],
            )
            .await
            .unwrap();

        // 2000 bytes in 535-byte chunks
        assert_eq!(fragments.len(), 1 + 4);
        match &packet {
            Packet::Data(data) => assert_eq!(data.fragment_count(), 4),
            other => panic!("unexpected packet {:?}", other.kind()),
        }
        assert!(fragments.iter().all(|f| f.len() <= 550));

        let header = Fragment::decode(&fragments[0]).unwrap();
        assert!(header.is_header());
        assert_eq!(header.correlation.id(), &1_700_000_000_000u64.to_be_bytes());

        let first_body = Fragment::decode(&fragments[1]).unwrap();
        assert_eq!(first_body.index, 1);
        assert_ne!(first_body.correlation, header.correlation);
        assert_eq!(
            first_body.correlation,
            CorrelationId::canonical(EncryptionScheme::None, 1_700_000_000_000, &master.address())
        );
    }

    #[tokio::test]
    async fn test_header_only_packet() {
        let master = KeyPair::generate();
        let session = KeyPair::generate();
        let peer = KeyPair::generate();
        let mut packet: Packet = PingPacket::new(identity(&master, &session)).into();

        let fragments = Fragmenter::new(550)
            .fragment(
                EncryptionScheme::Ec,
                &mut packet,
                &session,
                peer.public_key(),
                &peer.public_key().to_bytes(),
            )
            .await
            .unwrap();

        assert_eq!(fragments.len(), 1);
        // 236-byte header padded to 240, plus the ECIES envelope
        assert_eq!(fragments[0].len(), MICRO_HEADER_SIZE + 113 + 240);
    }

    #[tokio::test]
    async fn test_header_exceeding_max_is_rejected() {
        let master = KeyPair::generate();
        let session = KeyPair::generate();
        let peer = KeyPair::generate();

        for max in [1, 15, 16, 300] {
            let mut packet: Packet = PingPacket::new(identity(&master, &session)).into();
            let err = Fragmenter::new(max)
                .fragment(
                    EncryptionScheme::None,
                    &mut packet,
                    &session,
                    peer.public_key(),
                    &[],
                )
                .await
                .unwrap_err();
            assert!(
                matches!(
                    err,
                    UPacketsError::Capacity(CapacityError::FragmentTooLarge { .. })
                ),
                "max {max}: {err}"
            );
        }
    }

    #[tokio::test]
    async fn test_body_key_width_checked_first() {
        let master = KeyPair::generate();
        let session = KeyPair::generate();
        let peer = KeyPair::generate();
        let mut packet: Packet = DataPacket::new(identity(&master, &session), "M", vec![1u8; 10])
            .unwrap()
            .into();

        let err = Fragmenter::new(550)
            .fragment(
                EncryptionScheme::Symmetric,
                &mut packet,
                &session,
                peer.public_key(),
                &[0u8; 16],
            )
            .await
            .unwrap_err();
        assert_eq!(
            err,
            UPacketsError::Capacity(CapacityError::BodyKeyLength {
                scheme: EncryptionScheme::Symmetric,
                expected: 32,
                actual: 16
            })
        );
        assert!(packet.seal().is_none());
    }
}
