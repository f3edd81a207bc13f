#![no_main]
use cmskit_pki::cms::{self, CmsContent, CmsMessage, Secret};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(mut message) = cms::load(data) else {
        return;
    };
    let _ = message.to_der();
    match &mut message {
        CmsMessage::Signed(m) => {
            let _ = m.signers();
            let _ = m.certificates();
            let _ = m.validate_signature(false);
        }
        CmsMessage::Enveloped(m) => {
            let _ = m.recipients();
            let _ = m.calculate_version();
            let _ = m.decrypt_with_key(Secret::Key(&[0u8; 16]));
            let _ = m.compile();
        }
        CmsMessage::Digested(m) => {
            let _ = m.validate();
        }
        CmsMessage::Compressed(m) => {
            let _ = m.content();
        }
    }
});
