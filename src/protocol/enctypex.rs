// src/protocol/enctypex.rs
//
// The legacy stream cipher wrapping every server-list response. The client
// re-derives the keystream from the handoff key, the validate nonce it sent,
// and the challenge carried in the response header, so the transform must be
// reproduced byte for byte. All state lives in a 256-entry permutation table
// with five extra cells.

const TABLE_LEN: usize = 261;

// Header: [pad_len ^ 0xEC] [pad] [challenge_len ^ 0xEA] [challenge]
const HEADER_PAD_LEN: usize = 13;
const CHALLENGE_LEN: usize = 8;
const PAD_MASK: u8 = 0xEC;
const CHALLENGE_MASK: u8 = 0xEA;

pub fn encode(key: &[u8], validate: &[u8; 8], payload: &[u8]) -> Vec<u8> {
    let challenge = derive_challenge(key, validate);

    let mut out = Vec::with_capacity(2 + HEADER_PAD_LEN + CHALLENGE_LEN + payload.len());
    out.push(HEADER_PAD_LEN as u8 ^ PAD_MASK);
    out.extend_from_slice(&[0u8; HEADER_PAD_LEN]);
    out.push(CHALLENGE_LEN as u8 ^ CHALLENGE_MASK);
    out.extend_from_slice(&challenge);

    let mut table = schedule(key, validate, &challenge);
    out.extend(payload.iter().map(|&b| b ^ stream_byte(&mut table)));
    out
}

// Inverse of encode; the query path never needs it, but round-tripping is
// the only way to check the transform without a live game client.
pub fn decode(key: &[u8], validate: &[u8; 8], data: &[u8]) -> Option<Vec<u8>> {
    let challenge_at = (data.first()? ^ PAD_MASK) as usize + 2;
    if data.len() < challenge_at {
        return None;
    }
    let challenge_len = (data[challenge_at - 1] ^ CHALLENGE_MASK) as usize;
    let body_at = challenge_at + challenge_len;
    if data.len() < body_at {
        return None;
    }
    let challenge = &data[challenge_at..body_at];

    let mut table = schedule(key, validate, challenge);
    Some(
        data[body_at..]
            .iter()
            .map(|&b| b ^ stream_byte(&mut table))
            .collect(),
    )
}

// The response is deterministic for fixed inputs, so the header challenge is
// derived from the inputs rather than drawn from a generator.
fn derive_challenge(key: &[u8], validate: &[u8; 8]) -> [u8; CHALLENGE_LEN] {
    let mut challenge = [0u8; CHALLENGE_LEN];
    for (i, slot) in challenge.iter_mut().enumerate() {
        *slot = key[i % key.len()] ^ validate[i];
    }
    challenge
}

// Fold the challenge into a copy of the nonce, then build the table.
fn schedule(key: &[u8], validate: &[u8; 8], challenge: &[u8]) -> [u8; TABLE_LEN] {
    let mut id = *validate;
    for (i, &ch) in challenge.iter().enumerate() {
        let slot = (key[i % key.len()] as usize * i) & 7;
        id[slot] ^= id[i & 7] ^ ch;
    }
    key_table(&id)
}

fn key_table(id: &[u8; 8]) -> [u8; TABLE_LEN] {
    let mut table = [0u8; TABLE_LEN];
    for (i, slot) in table.iter_mut().take(256).enumerate() {
        *slot = i as u8;
    }
    let mut state = (0i32, 0i32);
    for i in (0..256usize).rev() {
        let pick = select(&table, i as i32, id, &mut state) as usize;
        table.swap(i, pick);
    }
    table[256] = table[1];
    table[257] = table[3];
    table[258] = table[5];
    table[259] = table[7];
    table[260] = table[(state.0 & 0xFF) as usize];
    table
}

// Masked selection over the id bytes; the narrowing `%` only kicks in after
// the mask has failed eleven times.
fn select(table: &[u8; TABLE_LEN], cnt: i32, id: &[u8; 8], state: &mut (i32, i32)) -> i32 {
    if cnt == 0 {
        return 0;
    }
    let mut mask: i32 = 1;
    if cnt > 1 {
        while mask < cnt {
            mask = (mask << 1) + 1;
        }
    }
    let mut rounds = 0;
    loop {
        state.0 = table[(state.0 & 0xFF) as usize] as i32 + id[state.1 as usize] as i32;
        state.1 += 1;
        if state.1 >= id.len() as i32 {
            state.1 = 0;
            state.0 += id.len() as i32;
        }
        let mut candidate = state.0 & mask;
        rounds += 1;
        if rounds > 11 {
            candidate %= cnt;
        }
        if candidate <= cnt {
            return candidate;
        }
    }
}

fn stream_byte(table: &mut [u8; TABLE_LEN]) -> u8 {
    let i = table[256].wrapping_add(1);
    table[256] = i;
    let a = table[i as usize];
    let j = table[257].wrapping_add(a);
    table[257] = j;
    let b = table[j as usize];
    table.swap(i as usize, j as usize);
    let k = table[a.wrapping_add(b) as usize] ^ table[258];
    table[258] = table[258].wrapping_add(table[260]);
    table[259] = table[259].wrapping_add(1);
    table[260] = table[260].wrapping_add(k);
    k
}
