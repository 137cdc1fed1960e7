use once_cell::sync::Lazy;
use rand::rngs::OsRng;
use rsa::RsaPrivateKey;

static KEY: Lazy<RsaPrivateKey> =
    Lazy::new(|| RsaPrivateKey::new(&mut OsRng, 2048).expect("generate test key"));
static OTHER_KEY: Lazy<RsaPrivateKey> =
    Lazy::new(|| RsaPrivateKey::new(&mut OsRng, 2048).expect("generate test key"));

pub(crate) fn test_key() -> &'static RsaPrivateKey {
    &KEY
}

pub(crate) fn other_test_key() -> &'static RsaPrivateKey {
    &OTHER_KEY
}
