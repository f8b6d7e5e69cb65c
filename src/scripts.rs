//! Lua scripts executed server-side by Redis.
//!
//! Each script is the whole admission decision for one algorithm: read the
//! per-key state, refill or purge, decide, persist, refresh the TTL, and
//! return `{allowed, remaining}`, all inside a single EVAL so concurrent
//! checks against the same key can never interleave. The scripts are fixed
//! artifacts compiled into the binary; `redis::Script` takes care of
//! EVALSHA caching with an EVAL fallback.

/// Token bucket decision.
///
/// KEYS[1] = bucket key
/// ARGV[1] = capacity, ARGV[2] = refill rate (tokens/sec),
/// ARGV[3] = current time in milliseconds
///
/// Millisecond timestamps keep fractional refills accurate at high rates.
/// The key expires after twice the full-refill time so idle buckets are
/// reclaimed.
pub const TOKEN_BUCKET: &str = r#"
local key = KEYS[1]
local capacity = tonumber(ARGV[1])
local refill_rate = tonumber(ARGV[2])
local now = tonumber(ARGV[3])

local bucket = redis.call('HMGET', key, 'tokens', 'last_refill')
local tokens = tonumber(bucket[1])
local last_refill = tonumber(bucket[2])

if tokens == nil then
    tokens = capacity
    last_refill = now
end

local elapsed_seconds = (now - last_refill) / 1000.0
tokens = math.min(capacity, tokens + elapsed_seconds * refill_rate)
last_refill = now

local allowed = 0
if tokens >= 1 then
    tokens = tokens - 1
    allowed = 1
end

redis.call('HSET', key, 'tokens', tokens, 'last_refill', last_refill)
redis.call('EXPIRE', key, math.ceil(capacity / refill_rate * 2))

return {allowed, math.floor(tokens)}
"#;

/// Sliding window log decision.
///
/// KEYS[1] = window key (a sorted set of admitted-request timestamps)
/// ARGV[1] = capacity, ARGV[2] = window length in seconds,
/// ARGV[3] = current time in seconds
///
/// Members are `timestamp:sequence` so two admissions in the same second
/// stay distinct in the set. The sequence counter lives under a derived
/// key and expires together with the window.
pub const SLIDING_WINDOW: &str = r#"
local key = KEYS[1]
local capacity = tonumber(ARGV[1])
local window = tonumber(ARGV[2])
local now = tonumber(ARGV[3])

local window_start = now - window
redis.call('ZREMRANGEBYSCORE', key, 0, window_start)
local current_count = redis.call('ZCARD', key)

local allowed = 0
local remaining = capacity - current_count

if current_count < capacity then
    local member = now .. ':' .. redis.call('INCR', key .. ':seq')
    redis.call('ZADD', key, now, member)
    allowed = 1
    remaining = remaining - 1
end

redis.call('EXPIRE', key, window + 10)
redis.call('EXPIRE', key .. ':seq', window + 10)

return {allowed, math.max(0, remaining)}
"#;
