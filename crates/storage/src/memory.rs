//! In-memory backend
//!
//! An in-process keyspace implementing the command subset and the script
//! catalogue with Redis semantics:
//!
//! - keys are binary-safe; a container key disappears when it becomes empty
//! - sorted sets order by (score, member); lex ranges compare member bytes
//! - commands against a key of another type fail with `WRONGTYPE`
//! - a batch runs under one lock acquisition; like `EXEC`, a failing
//!   command does not stop the rest, and the first failure is returned
//!
//! All connections of one [`MemoryBackend`] share its keyspace. A command,
//! a script or a batch holds the keyspace lock for its whole duration, which
//! gives the same no-interleaving guarantee as the real store.

use crate::command::{format_score, Command};
use crate::reply::{parse_score, Reply};
use crate::scripts::Script;
use crate::traits::{Backend, Connection};
use parking_lot::Mutex;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use strata_model_core::key::{
    id_from_string_member, KEY_SEPARATOR, MEMBERS_SUFFIX, STRING_INDEX_SEPARATOR,
};
use strata_model_core::{StoreError, StoreResult};

const WRONG_TYPE: &str = "WRONGTYPE Operation against a key holding the wrong kind of value";

/// Shared in-process keyspace
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    keyspace: Arc<Mutex<Keyspace>>,
}

impl MemoryBackend {
    /// Create a backend with an empty keyspace
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live keys
    pub fn key_count(&self) -> usize {
        self.keyspace.lock().entries.len()
    }

    /// Live keys, sorted, with non-UTF-8 bytes replaced
    pub fn keys(&self) -> Vec<String> {
        let keyspace = self.keyspace.lock();
        let mut keys: Vec<String> = keyspace
            .entries
            .keys()
            .map(|k| String::from_utf8_lossy(k).into_owned())
            .collect();
        keys.sort();
        keys
    }

    /// Type of a key as `TYPE` reports it, `None` if absent
    pub fn type_of(&self, key: &str) -> Option<&'static str> {
        self.keyspace
            .lock()
            .entries
            .get(key.as_bytes())
            .map(Entry::type_name)
    }

    /// Drop every key
    pub fn flush(&self) {
        self.keyspace.lock().entries.clear();
    }
}

impl Backend for MemoryBackend {
    fn connect(&self) -> StoreResult<Box<dyn Connection>> {
        Ok(Box::new(MemoryConnection {
            keyspace: Arc::clone(&self.keyspace),
        }))
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

/// A connection to a [`MemoryBackend`]
pub struct MemoryConnection {
    keyspace: Arc<Mutex<Keyspace>>,
}

impl Connection for MemoryConnection {
    fn execute(&mut self, command: &Command) -> StoreResult<Reply> {
        check_arity(command)?;
        self.keyspace.lock().apply(command)
    }

    fn execute_atomic(&mut self, commands: &[Command]) -> StoreResult<Vec<Reply>> {
        for command in commands {
            check_arity(command).map_err(|e| {
                StoreError::Protocol(format!(
                    "EXECABORT Transaction discarded because of previous errors: {e}"
                ))
            })?;
        }

        let mut keyspace = self.keyspace.lock();
        let mut replies = Vec::with_capacity(commands.len());
        let mut first_error = None;
        for command in commands {
            match keyspace.apply(command) {
                Ok(reply) => replies.push(reply),
                Err(e) => {
                    first_error.get_or_insert(e);
                    replies.push(Reply::Nil);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(replies),
        }
    }
}

fn check_arity(command: &Command) -> StoreResult<()> {
    if command.has_required_args() {
        Ok(())
    } else {
        Err(StoreError::Protocol(format!(
            "ERR wrong number of arguments for '{}' command",
            command.name().to_lowercase()
        )))
    }
}

#[derive(Debug, Clone)]
enum Entry {
    Hash(BTreeMap<Vec<u8>, Vec<u8>>),
    Set(BTreeSet<Vec<u8>>),
    ZSet(SortedSet),
}

impl Entry {
    fn type_name(&self) -> &'static str {
        match self {
            Entry::Hash(_) => "hash",
            Entry::Set(_) => "set",
            Entry::ZSet(_) => "zset",
        }
    }

    fn is_empty(&self) -> bool {
        match self {
            Entry::Hash(h) => h.is_empty(),
            Entry::Set(s) => s.is_empty(),
            Entry::ZSet(z) => z.len() == 0,
        }
    }
}

/// Sorted-set score with a total order
#[derive(Debug, Clone, Copy)]
struct Score(f64);

impl PartialEq for Score {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Score {}

impl PartialOrd for Score {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Score {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

#[derive(Debug, Clone, Default)]
struct SortedSet {
    scores: HashMap<Vec<u8>, f64>,
    order: BTreeSet<(Score, Vec<u8>)>,
}

impl SortedSet {
    fn len(&self) -> usize {
        self.scores.len()
    }

    /// Insert or rescore; true if the member is new
    fn insert(&mut self, member: Vec<u8>, score: f64) -> bool {
        // -0.0 and 0.0 are the same score
        let score = if score == 0.0 { 0.0 } else { score };
        let previous = self.scores.insert(member.clone(), score);
        if let Some(old) = previous {
            self.order.remove(&(Score(old), member.clone()));
        }
        self.order.insert((Score(score), member));
        previous.is_none()
    }

    fn remove(&mut self, member: &[u8]) -> bool {
        match self.scores.remove(member) {
            Some(old) => {
                self.order.remove(&(Score(old), member.to_vec()));
                true
            }
            None => false,
        }
    }

    fn score(&self, member: &[u8]) -> Option<f64> {
        self.scores.get(member).copied()
    }

    fn members(&self) -> impl Iterator<Item = (f64, &Vec<u8>)> {
        self.order.iter().map(|(score, member)| (score.0, member))
    }

    fn range_by_rank(&self, start: i64, stop: i64) -> Vec<Vec<u8>> {
        let len = self.len() as i64;
        let start = if start < 0 { (len + start).max(0) } else { start };
        let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
        if start > stop || start >= len {
            return Vec::new();
        }
        self.members()
            .skip(start as usize)
            .take((stop - start + 1) as usize)
            .map(|(_, member)| member.clone())
            .collect()
    }

    fn range_by_score(&self, min: ScoreLimit, max: ScoreLimit) -> Vec<Vec<u8>> {
        self.members()
            .filter(|(score, _)| min.admits_from_below(*score) && max.admits_from_above(*score))
            .map(|(_, member)| member.clone())
            .collect()
    }

    fn range_by_lex(&self, min: &LexLimit, max: &LexLimit) -> Vec<Vec<u8>> {
        self.members()
            .filter(|(_, member)| min.admits_from_below(member) && max.admits_from_above(member))
            .map(|(_, member)| member.clone())
            .collect()
    }
}

/// One end of a `ZRANGEBYSCORE` range
#[derive(Debug, Clone, Copy)]
struct ScoreLimit {
    value: f64,
    exclusive: bool,
}

impl ScoreLimit {
    fn parse(raw: &[u8]) -> StoreResult<Self> {
        let invalid = || StoreError::Protocol("ERR min or max is not a float".to_string());
        let text = std::str::from_utf8(raw).map_err(|_| invalid())?;
        let (exclusive, number) = match text.strip_prefix('(') {
            Some(rest) => (true, rest),
            None => (false, text),
        };
        let value = parse_score(number).filter(|v| !v.is_nan()).ok_or_else(invalid)?;
        Ok(Self { value, exclusive })
    }

    fn admits_from_below(&self, score: f64) -> bool {
        if self.exclusive {
            score > self.value
        } else {
            score >= self.value
        }
    }

    fn admits_from_above(&self, score: f64) -> bool {
        if self.exclusive {
            score < self.value
        } else {
            score <= self.value
        }
    }
}

/// One end of a `ZRANGEBYLEX` range
#[derive(Debug, Clone)]
enum LexLimit {
    NegInf,
    PosInf,
    Inclusive(Vec<u8>),
    Exclusive(Vec<u8>),
}

impl LexLimit {
    fn parse(raw: &[u8]) -> StoreResult<Self> {
        match raw.split_first() {
            Some((b'-', [])) => Ok(LexLimit::NegInf),
            Some((b'+', [])) => Ok(LexLimit::PosInf),
            Some((b'[', rest)) => Ok(LexLimit::Inclusive(rest.to_vec())),
            Some((b'(', rest)) => Ok(LexLimit::Exclusive(rest.to_vec())),
            _ => Err(StoreError::Protocol(
                "ERR min or max not valid string range item".to_string(),
            )),
        }
    }

    fn admits_from_below(&self, member: &[u8]) -> bool {
        match self {
            LexLimit::NegInf => true,
            LexLimit::PosInf => false,
            LexLimit::Inclusive(v) => member >= v.as_slice(),
            LexLimit::Exclusive(v) => member > v.as_slice(),
        }
    }

    fn admits_from_above(&self, member: &[u8]) -> bool {
        match self {
            LexLimit::NegInf => false,
            LexLimit::PosInf => true,
            LexLimit::Inclusive(v) => member <= v.as_slice(),
            LexLimit::Exclusive(v) => member < v.as_slice(),
        }
    }
}

#[derive(Debug, Default)]
struct Keyspace {
    entries: HashMap<Vec<u8>, Entry>,
}

impl Keyspace {
    fn apply(&mut self, command: &Command) -> StoreResult<Reply> {
        match command {
            Command::HSet { key, fields } => {
                let hash = self.hash_mut(key.as_bytes())?;
                let mut added = 0;
                for (field, value) in fields {
                    if hash.insert(field.as_bytes().to_vec(), value.clone()).is_none() {
                        added += 1;
                    }
                }
                Ok(Reply::Int(added))
            }
            Command::HDel { key, fields } => {
                let removed = match self.existing_hash_mut(key.as_bytes())? {
                    Some(hash) => fields
                        .iter()
                        .filter(|f| hash.remove(f.as_bytes()).is_some())
                        .count() as i64,
                    None => 0,
                };
                self.remove_if_empty(key.as_bytes());
                Ok(Reply::Int(removed))
            }
            Command::HGetAll { key } => {
                let items = match self.hash(key.as_bytes())? {
                    Some(hash) => hash
                        .iter()
                        .flat_map(|(f, v)| [Reply::Bytes(f.clone()), Reply::Bytes(v.clone())])
                        .collect(),
                    None => Vec::new(),
                };
                Ok(Reply::Array(items))
            }
            Command::HMGet { key, fields } => {
                let hash = self.hash(key.as_bytes())?;
                let items = fields
                    .iter()
                    .map(|f| match hash.and_then(|h| h.get(f.as_bytes())) {
                        Some(v) => Reply::Bytes(v.clone()),
                        None => Reply::Nil,
                    })
                    .collect();
                Ok(Reply::Array(items))
            }
            Command::Del { keys } => {
                let removed = keys
                    .iter()
                    .filter(|k| self.entries.remove(k.as_bytes()).is_some())
                    .count();
                Ok(Reply::Int(removed as i64))
            }
            Command::SAdd { key, members } => {
                let set = self.set_mut(key.as_bytes())?;
                let added = members.iter().filter(|m| set.insert((*m).clone())).count();
                Ok(Reply::Int(added as i64))
            }
            Command::SRem { key, members } => {
                let mut removed = 0;
                for member in members {
                    removed += self.srem(key.as_bytes(), member)?;
                }
                Ok(Reply::Int(removed))
            }
            Command::SIsMember { key, member } => {
                let present = self.set(key.as_bytes())?.map_or(false, |s| s.contains(member));
                Ok(Reply::Int(present as i64))
            }
            Command::SCard { key } => {
                let len = self.set(key.as_bytes())?.map_or(0, |s| s.len());
                Ok(Reply::Int(len as i64))
            }
            Command::SMembers { key } => {
                let items = self
                    .set(key.as_bytes())?
                    .map(|s| s.iter().map(|m| Reply::Bytes(m.clone())).collect())
                    .unwrap_or_default();
                Ok(Reply::Array(items))
            }
            Command::ZAdd { key, entries } => {
                if entries.iter().any(|(score, _)| score.is_nan()) {
                    return Err(StoreError::Protocol(
                        "ERR value is not a valid float".to_string(),
                    ));
                }
                let mut added = 0;
                for (score, member) in entries {
                    added += self.zadd(key.as_bytes(), *score, member.clone())?;
                }
                Ok(Reply::Int(added))
            }
            Command::ZRem { key, members } => {
                let mut removed = 0;
                for member in members {
                    removed += self.zrem(key.as_bytes(), member)?;
                }
                Ok(Reply::Int(removed))
            }
            Command::ZScore { key, member } => {
                let score = self.zset(key.as_bytes())?.and_then(|z| z.score(member));
                Ok(match score {
                    Some(score) => Reply::Bytes(format_score(score).into_bytes()),
                    None => Reply::Nil,
                })
            }
            Command::ZCard { key } => {
                let len = self.zset(key.as_bytes())?.map_or(0, |z| z.len());
                Ok(Reply::Int(len as i64))
            }
            Command::ZRange { key, start, stop } => {
                let members = self
                    .zset(key.as_bytes())?
                    .map(|z| z.range_by_rank(*start, *stop))
                    .unwrap_or_default();
                Ok(bytes_array(members))
            }
            Command::Eval { script, keys, args } => {
                let keys: Vec<&[u8]> = keys.iter().map(|k| k.as_bytes()).collect();
                self.run_script(*script, &keys, args).map_err(|e| match e {
                    StoreError::Protocol(message) => StoreError::Script {
                        script: script.name().to_string(),
                        message,
                    },
                    other => other,
                })
            }
        }
    }

    fn run_script(
        &mut self,
        script: Script,
        keys: &[&[u8]],
        args: &[Vec<u8>],
    ) -> StoreResult<Reply> {
        match script {
            Script::BulkDeleteBySet => self.bulk_delete_by_set(keys[0], args),
            Script::RemoveStringIndexEntry => {
                let [id, field] = script_args(args)?;
                let value = self.hash(keys[0])?.and_then(|h| h.get(field.as_slice())).cloned();
                let removed = match value {
                    Some(value) => self.zrem(keys[1], &string_member(&value, id))?,
                    None => 0,
                };
                Ok(Reply::Int(removed))
            }
            Script::ExtractScoreRange => {
                let [min, max] = script_args(args)?;
                let (min, max) = (ScoreLimit::parse(min)?, ScoreLimit::parse(max)?);
                let ids = self
                    .zset(keys[0])?
                    .map(|z| z.range_by_score(min, max))
                    .unwrap_or_default();
                self.store_sequential(keys[1], ids)
            }
            Script::ExtractLexRange => {
                let [min, max] = script_args(args)?;
                let (min, max) = (LexLimit::parse(min)?, LexLimit::parse(max)?);
                let ids = self
                    .zset(keys[0])?
                    .map(|z| z.range_by_lex(&min, &max))
                    .unwrap_or_default()
                    .into_iter()
                    .map(|member| id_from_string_member(&member).unwrap_or(&member).to_vec())
                    .collect();
                self.store_sequential(keys[1], ids)
            }
        }
    }

    fn bulk_delete_by_set(&mut self, set_key: &[u8], args: &[Vec<u8>]) -> StoreResult<Reply> {
        let Some((collection, specs)) = args.split_first() else {
            return Err(StoreError::Protocol("missing collection name".to_string()));
        };
        let mut fields = Vec::with_capacity(specs.len());
        for spec in specs {
            match spec.as_slice() {
                [kind @ (b's' | b'n'), b':', field @ ..] => fields.push((*kind == b's', field)),
                _ => {
                    return Err(StoreError::Protocol(format!(
                        "invalid index spec {:?}",
                        String::from_utf8_lossy(spec)
                    )))
                }
            }
        }

        let ids: Vec<Vec<u8>> = match self.entries.get(set_key) {
            Some(Entry::Set(set)) => set.iter().cloned().collect(),
            Some(Entry::ZSet(zset)) => zset.members().map(|(_, m)| m.clone()).collect(),
            _ => return Ok(Reply::Int(0)),
        };

        let members_key = join_key(collection, MEMBERS_SUFFIX.as_bytes());
        let mut count = 0;
        for id in &ids {
            let record_key = join_key(collection, id);
            for (is_string, field) in &fields {
                let index_key = join_key(collection, field);
                if *is_string {
                    let value = self.hash(&record_key)?.and_then(|h| h.get(*field)).cloned();
                    if let Some(value) = value {
                        self.zrem(&index_key, &string_member(&value, id))?;
                    }
                } else {
                    self.zrem(&index_key, id)?;
                }
            }
            let deleted = self.entries.remove(&record_key).is_some();
            let removed = self.srem(&members_key, id)? > 0;
            if deleted || removed {
                count += 1;
            }
        }
        Ok(Reply::Int(count))
    }

    fn store_sequential(&mut self, dest: &[u8], members: Vec<Vec<u8>>) -> StoreResult<Reply> {
        let count = members.len() as i64;
        for (rank, member) in members.into_iter().enumerate() {
            self.zadd(dest, (rank + 1) as f64, member)?;
        }
        Ok(Reply::Int(count))
    }

    fn zadd(&mut self, key: &[u8], score: f64, member: Vec<u8>) -> StoreResult<i64> {
        let entry = self
            .entries
            .entry(key.to_vec())
            .or_insert_with(|| Entry::ZSet(SortedSet::default()));
        let added = match entry {
            Entry::ZSet(zset) => zset.insert(member, score),
            _ => return Err(wrong_type()),
        };
        Ok(added as i64)
    }

    fn zrem(&mut self, key: &[u8], member: &[u8]) -> StoreResult<i64> {
        let removed = match self.entries.get_mut(key) {
            None => false,
            Some(Entry::ZSet(zset)) => zset.remove(member),
            Some(_) => return Err(wrong_type()),
        };
        self.remove_if_empty(key);
        Ok(removed as i64)
    }

    fn srem(&mut self, key: &[u8], member: &[u8]) -> StoreResult<i64> {
        let removed = match self.entries.get_mut(key) {
            None => false,
            Some(Entry::Set(set)) => set.remove(member),
            Some(_) => return Err(wrong_type()),
        };
        self.remove_if_empty(key);
        Ok(removed as i64)
    }

    fn hash(&self, key: &[u8]) -> StoreResult<Option<&BTreeMap<Vec<u8>, Vec<u8>>>> {
        match self.entries.get(key) {
            None => Ok(None),
            Some(Entry::Hash(hash)) => Ok(Some(hash)),
            Some(_) => Err(wrong_type()),
        }
    }

    fn hash_mut(&mut self, key: &[u8]) -> StoreResult<&mut BTreeMap<Vec<u8>, Vec<u8>>> {
        let entry = self
            .entries
            .entry(key.to_vec())
            .or_insert_with(|| Entry::Hash(BTreeMap::new()));
        match entry {
            Entry::Hash(hash) => Ok(hash),
            _ => Err(wrong_type()),
        }
    }

    fn existing_hash_mut(
        &mut self,
        key: &[u8],
    ) -> StoreResult<Option<&mut BTreeMap<Vec<u8>, Vec<u8>>>> {
        match self.entries.get_mut(key) {
            None => Ok(None),
            Some(Entry::Hash(hash)) => Ok(Some(hash)),
            Some(_) => Err(wrong_type()),
        }
    }

    fn set(&self, key: &[u8]) -> StoreResult<Option<&BTreeSet<Vec<u8>>>> {
        match self.entries.get(key) {
            None => Ok(None),
            Some(Entry::Set(set)) => Ok(Some(set)),
            Some(_) => Err(wrong_type()),
        }
    }

    fn set_mut(&mut self, key: &[u8]) -> StoreResult<&mut BTreeSet<Vec<u8>>> {
        let entry = self
            .entries
            .entry(key.to_vec())
            .or_insert_with(|| Entry::Set(BTreeSet::new()));
        match entry {
            Entry::Set(set) => Ok(set),
            _ => Err(wrong_type()),
        }
    }

    fn zset(&self, key: &[u8]) -> StoreResult<Option<&SortedSet>> {
        match self.entries.get(key) {
            None => Ok(None),
            Some(Entry::ZSet(zset)) => Ok(Some(zset)),
            Some(_) => Err(wrong_type()),
        }
    }

    fn remove_if_empty(&mut self, key: &[u8]) {
        if self.entries.get(key).map_or(false, Entry::is_empty) {
            self.entries.remove(key);
        }
    }
}

fn script_args(args: &[Vec<u8>]) -> StoreResult<[&Vec<u8>; 2]> {
    match args {
        [a, b] => Ok([a, b]),
        _ => Err(StoreError::Protocol(format!(
            "expected 2 arguments, got {}",
            args.len()
        ))),
    }
}

fn join_key(prefix: &[u8], suffix: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(prefix.len() + 1 + suffix.len());
    key.extend_from_slice(prefix);
    key.push(KEY_SEPARATOR as u8);
    key.extend_from_slice(suffix);
    key
}

fn string_member(value: &[u8], id: &[u8]) -> Vec<u8> {
    let mut member = Vec::with_capacity(value.len() + 1 + id.len());
    member.extend_from_slice(value);
    member.push(STRING_INDEX_SEPARATOR);
    member.extend_from_slice(id);
    member
}

fn bytes_array(items: Vec<Vec<u8>>) -> Reply {
    Reply::Array(items.into_iter().map(Reply::Bytes).collect())
}

fn wrong_type() -> StoreError {
    StoreError::Protocol(WRONG_TYPE.to_string())
}
