use vcsms_crypto::dhke::GROUP14_2048;
use vcsms_crypto::keys::{fingerprint, generate_keypair};
use vcsms_crypto::{aes256, dhke, signing};

#[test]
fn dh_agreement_then_aes_session_round_trip() {
    let (pub_a, priv_a) = generate_keypair(256).unwrap();
    let (pub_b, _priv_b) = generate_keypair(256).unwrap();
    assert_ne!(fingerprint(&pub_a), fingerprint(&pub_b));

    let a_dh_priv = dhke::generate_private(&GROUP14_2048);
    let b_dh_priv = dhke::generate_private(&GROUP14_2048);
    let (a_dh_pub, a_sig) = signing::gen_signed_dh(&a_dh_priv, &priv_a, &GROUP14_2048);
    assert!(signing::verify_signed_dh(&a_dh_pub, &a_sig, &pub_a));

    let b_dh_pub = dhke::public_value(&GROUP14_2048, &b_dh_priv);
    let a_shared = dhke::shared_secret(&GROUP14_2048, &a_dh_priv, &b_dh_pub);
    let b_shared = dhke::shared_secret(&GROUP14_2048, &b_dh_priv, &a_dh_pub);
    assert_eq!(a_shared, b_shared);

    let key_a = aes256::SessionKey::from_shared_secret(&a_shared.to_bytes_be());
    let key_b = aes256::SessionKey::from_shared_secret(&b_shared.to_bytes_be());
    let (iv, ct) = aes256::encrypt(b"over the wire", &key_a);
    assert_eq!(aes256::decrypt(&iv, &ct, &key_b).unwrap(), b"over the wire");
}

#[test]
fn signature_does_not_verify_under_the_wrong_key() {
    let (_pub_a, priv_a) = generate_keypair(256).unwrap();
    let (pub_b, _priv_b) = generate_keypair(256).unwrap();
    let sig = signing::sign(b"message", &priv_a);
    assert!(!signing::verify(b"message", &sig, &pub_b));
}
