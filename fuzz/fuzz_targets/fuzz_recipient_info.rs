#![no_main]
use cmskit_pki::cms::{RecipientInfo, Secret};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(recipient) = RecipientInfo::from_der(data) {
        assert_eq!(RecipientInfo::from_der(&recipient.to_der()).ok(), Some(recipient.clone()));
        let _ = recipient.unwrap_key(&Secret::Key(&[0x5au8; 16]));
        let _ = recipient.unwrap_key(&Secret::Password(b"fuzz"));
    }
});
