//! Per-space vector rows of one segment.
//!
//! Rows are append-only and addressed by offset; an upsert of an existing point
//! tombstones its old row. Once tombstones dominate, the owning space swaps in a
//! compacted copy, which renumbers offsets. Full-precision rows live in RAM unless the space is
//! quantized without `always_ram` and its codes exist, in which case they are
//! spilled to an anonymous temp file and only read back for rescoring and exact
//! search. Codes always stay in RAM.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config;
use crate::error::{Error, Result};
use crate::hnsw::distance::norm_sq;
use crate::hnsw::{Distance, VectorSource};
use crate::index::flat;
use crate::params::{CompressionRatio, QuantizationParams};
use crate::point::PointId;
use crate::quantization::{ProductCodebook, QuantizedVector, VectorRef};

const F32_BYTES: usize = std::mem::size_of::<f32>();

#[derive(Debug)]
enum RawVectors {
    Ram(Vec<f32>),
    Disk(DiskVectors),
}

#[derive(Debug)]
struct DiskVectors {
    file: Mutex<File>,
    rows: usize,
}

impl DiskVectors {
    fn spill(rows: &[f32], dim: usize, dir: Option<&PathBuf>) -> Result<Self> {
        let mut file = match dir {
            Some(dir) => tempfile::tempfile_in(dir)?,
            None => tempfile::tempfile()?,
        };
        file.write_all(&to_bytes(rows))?;
        file.flush()?;
        Ok(Self {
            file: Mutex::new(file),
            rows: if dim == 0 { 0 } else { rows.len() / dim },
        })
    }

    fn append(&mut self, vector: &[f32]) -> Result<()> {
        let offset = (self.rows * vector.len() * F32_BYTES) as u64;
        let file = self.file.get_mut();
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(&to_bytes(vector))?;
        self.rows += 1;
        Ok(())
    }

    fn read_row(&self, offset: u32, dim: usize) -> Result<Vec<f32>> {
        let mut buf = vec![0u8; dim * F32_BYTES];
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start((offset as usize * dim * F32_BYTES) as u64))?;
        file.read_exact(&mut buf)?;
        Ok(from_bytes(&buf))
    }

    fn read_all(&self, dim: usize) -> Result<Vec<f32>> {
        let mut buf = vec![0u8; self.rows * dim * F32_BYTES];
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(0))?;
        file.read_exact(&mut buf)?;
        Ok(from_bytes(&buf))
    }
}

fn to_bytes(values: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(values.len() * F32_BYTES);
    for v in values {
        out.extend_from_slice(&v.to_le_bytes());
    }
    out
}

fn from_bytes(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(F32_BYTES)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

/// Scalar codes, one `dim`-byte row per offset with its clipping range.
#[derive(Debug, Clone)]
struct ScalarCodes {
    quantile: f32,
    data: Vec<u8>,
    min: Vec<f32>,
    scale: Vec<f32>,
}

impl ScalarCodes {
    fn new(quantile: f32) -> Self {
        Self {
            quantile,
            data: Vec::new(),
            min: Vec::new(),
            scale: Vec::new(),
        }
    }

    fn push(&mut self, vector: &[f32]) {
        let q = QuantizedVector::quantize(vector, self.quantile);
        self.data.extend_from_slice(&q.data);
        self.min.push(q.min);
        self.scale.push(q.scale);
    }

    fn copy_row(&mut self, from: &ScalarCodes, offset: u32, dim: usize) {
        let row = from.row(offset, dim);
        self.data.extend_from_slice(row.data);
        self.min.push(row.min);
        self.scale.push(row.scale);
    }

    fn row(&self, offset: u32, dim: usize) -> VectorRef<'_> {
        let i = offset as usize;
        VectorRef {
            data: &self.data[i * dim..(i + 1) * dim],
            min: self.min[i],
            scale: self.scale[i],
        }
    }
}

#[derive(Debug, Clone)]
struct ProductCodes {
    codebook: Arc<ProductCodebook>,
    compression: CompressionRatio,
    codes: Vec<u8>,
}

impl ProductCodes {
    fn row(&self, offset: u32) -> &[u8] {
        let width = self.codebook.num_subspaces;
        let i = offset as usize;
        &self.codes[i * width..(i + 1) * width]
    }
}

#[derive(Debug)]
pub struct VectorStorage {
    dim: usize,
    distance: Distance,
    raw: RawVectors,
    scalar: Option<ScalarCodes>,
    product: Option<ProductCodes>,
    deleted: Vec<bool>,
    offset_ids: Vec<PointId>,
    id_offsets: HashMap<PointId, u32>,
    live: usize,
    quantization: Option<QuantizationParams>,
    spill_dir: Option<PathBuf>,
}

impl VectorStorage {
    pub fn new(dim: usize, distance: Distance, spill_dir: Option<PathBuf>) -> Self {
        Self {
            dim,
            distance,
            raw: RawVectors::Ram(Vec::new()),
            scalar: None,
            product: None,
            deleted: Vec::new(),
            offset_ids: Vec::new(),
            id_offsets: HashMap::new(),
            live: 0,
            quantization: None,
            spill_dir,
        }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn distance(&self) -> Distance {
        self.distance
    }

    /// Total rows, tombstones included.
    pub fn len(&self) -> usize {
        self.offset_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offset_ids.is_empty()
    }

    pub fn live_count(&self) -> usize {
        self.live
    }

    pub fn live_offsets(&self) -> impl Iterator<Item = u32> + '_ {
        self.deleted
            .iter()
            .enumerate()
            .filter(|(_, d)| !**d)
            .map(|(i, _)| i as u32)
    }

    pub fn live_ids(&self) -> impl Iterator<Item = PointId> + '_ {
        self.id_offsets.keys().copied()
    }

    pub fn contains(&self, id: &PointId) -> bool {
        self.id_offsets.contains_key(id)
    }

    pub fn point_id(&self, offset: u32) -> PointId {
        self.offset_ids[offset as usize]
    }

    pub fn is_deleted(&self, offset: u32) -> bool {
        self.deleted[offset as usize]
    }

    pub fn quantization(&self) -> Option<&QuantizationParams> {
        self.quantization.as_ref()
    }

    pub fn raw_in_ram(&self) -> bool {
        matches!(self.raw, RawVectors::Ram(_))
    }

    /// Whether codes for the configured quantization method are present.
    pub fn has_codes(&self) -> bool {
        match self.quantization {
            Some(QuantizationParams::Scalar(_)) => self.scalar.is_some(),
            Some(QuantizationParams::Product(_)) => self.product.is_some(),
            None => false,
        }
    }

    /// Product quantization configured but no codebook trained yet.
    pub fn needs_codebook(&self) -> Option<CompressionRatio> {
        match self.quantization {
            Some(QuantizationParams::Product(p)) if self.product.is_none() => Some(p.compression),
            _ => None,
        }
    }

    /// Append `vector` for `id`. Returns the new offset and the tombstoned one, if any.
    pub fn upsert(&mut self, id: PointId, vector: &[f32]) -> Result<(u32, Option<u32>)> {
        debug_assert_eq!(vector.len(), self.dim);
        let offset = u32::try_from(self.offset_ids.len())
            .map_err(|_| Error::Storage("segment row limit reached".to_string()))?;
        match &mut self.raw {
            RawVectors::Ram(rows) => rows.extend_from_slice(vector),
            RawVectors::Disk(disk) => disk.append(vector)?,
        }
        if let Some(scalar) = &mut self.scalar {
            scalar.push(vector);
        }
        if let Some(product) = &mut self.product {
            let codes = product.codebook.encode(vector);
            product.codes.extend_from_slice(&codes);
        }
        self.deleted.push(false);
        self.offset_ids.push(id);
        let previous = self.id_offsets.insert(id, offset);
        match previous {
            Some(old) => self.deleted[old as usize] = true,
            None => self.live += 1,
        }
        Ok((offset, previous))
    }

    /// Tombstone the row of `id`. Returns its offset if it was live.
    pub fn delete(&mut self, id: &PointId) -> Option<u32> {
        let offset = self.id_offsets.remove(id)?;
        self.deleted[offset as usize] = true;
        self.live -= 1;
        Some(offset)
    }

    /// Whether enough rows are tombstoned to be worth compacting.
    pub fn needs_compaction(&self) -> bool {
        let rows = self.len();
        rows >= config::COMPACTION_MIN_ROWS
            && (rows - self.live) as f64 > rows as f64 * config::COMPACTION_DELETED_RATIO
    }

    /// Current tombstone flags, one per row.
    pub fn tombstones(&self) -> Vec<bool> {
        self.deleted.clone()
    }

    /// Copy of this storage without the rows flagged in `dropped`.
    ///
    /// Offsets past `dropped.len()` are kept, tombstoned or not, so a build that
    /// snapshotted `dropped` can map its node ids onto the copy. Surviving rows
    /// keep their order. Only tombstoned rows may be dropped.
    pub fn compacted(&self, dropped: &[bool]) -> Result<VectorStorage> {
        let raw: Cow<'_, [f32]> = match &self.raw {
            RawVectors::Ram(rows) => Cow::Borrowed(rows.as_slice()),
            RawVectors::Disk(disk) => Cow::Owned(disk.read_all(self.dim)?),
        };
        let mut out = VectorStorage::new(self.dim, self.distance, self.spill_dir.clone());
        out.quantization = self.quantization;
        let mut rows = Vec::with_capacity(self.live * self.dim);
        let mut scalar = self.scalar.as_ref().map(|s| ScalarCodes::new(s.quantile));
        let mut product = self.product.as_ref().map(|p| ProductCodes {
            codebook: Arc::clone(&p.codebook),
            compression: p.compression,
            codes: Vec::with_capacity(self.live * p.codebook.num_subspaces),
        });

        for offset in 0..self.len() {
            if dropped.get(offset).copied().unwrap_or(false) {
                debug_assert!(self.deleted[offset], "dropping a live row");
                continue;
            }
            let source = offset as u32;
            let target = out.offset_ids.len() as u32;
            rows.extend_from_slice(&raw[offset * self.dim..(offset + 1) * self.dim]);
            if let (Some(dst), Some(src)) = (scalar.as_mut(), self.scalar.as_ref()) {
                dst.copy_row(src, source, self.dim);
            }
            if let (Some(dst), Some(src)) = (product.as_mut(), self.product.as_ref()) {
                dst.codes.extend_from_slice(src.row(source));
            }
            let id = self.offset_ids[offset];
            out.offset_ids.push(id);
            out.deleted.push(self.deleted[offset]);
            if !self.deleted[offset] {
                out.id_offsets.insert(id, target);
                out.live += 1;
            }
        }

        out.raw = RawVectors::Ram(rows);
        out.scalar = scalar;
        out.product = product;
        out.settle_residency()?;
        Ok(out)
    }

    /// Drop every tombstoned row in place. Returns how many rows were removed.
    pub fn compact(&mut self) -> Result<usize> {
        let before = self.len();
        let tombstones = self.tombstones();
        *self = self.compacted(&tombstones)?;
        Ok(before - self.len())
    }

    /// Full-precision row at `offset`.
    pub fn read_raw(&self, offset: u32) -> Result<Cow<'_, [f32]>> {
        match &self.raw {
            RawVectors::Ram(rows) => {
                let start = offset as usize * self.dim;
                Ok(Cow::Borrowed(&rows[start..start + self.dim]))
            }
            RawVectors::Disk(disk) => disk.read_row(offset, self.dim).map(Cow::Owned),
        }
    }

    /// Full-precision rows of the live offsets in order, with the tombstone flags
    /// of every row at the time of the snapshot.
    pub fn snapshot_live(&self) -> Result<(Vec<f32>, Vec<bool>)> {
        let raw: Cow<'_, [f32]> = match &self.raw {
            RawVectors::Ram(rows) => Cow::Borrowed(rows.as_slice()),
            RawVectors::Disk(disk) => Cow::Owned(disk.read_all(self.dim)?),
        };
        let mut rows = Vec::with_capacity(self.live * self.dim);
        for offset in self.live_offsets() {
            let start = offset as usize * self.dim;
            rows.extend_from_slice(&raw[start..start + self.dim]);
        }
        Ok((rows, self.tombstones()))
    }

    /// Apply a new quantization config, re-encoding or dropping codes as needed.
    pub fn configure(&mut self, quantization: Option<&QuantizationParams>) -> Result<()> {
        if self.quantization.as_ref() == quantization {
            return Ok(());
        }
        // Rows must be reachable in full precision while codes change.
        self.load_raw()?;
        match quantization {
            None => {
                self.scalar = None;
                self.product = None;
            }
            Some(QuantizationParams::Scalar(s)) => {
                self.product = None;
                let keep = matches!(&self.scalar, Some(codes) if codes.quantile == s.quantile);
                if !keep {
                    let mut codes = ScalarCodes::new(s.quantile);
                    if let RawVectors::Ram(rows) = &self.raw {
                        for row in rows.chunks_exact(self.dim.max(1)) {
                            codes.push(row);
                        }
                    }
                    self.scalar = Some(codes);
                }
            }
            Some(QuantizationParams::Product(p)) => {
                self.scalar = None;
                if !matches!(&self.product, Some(codes) if codes.compression == p.compression) {
                    self.product = None;
                }
            }
        }
        self.quantization = quantization.copied();
        self.settle_residency()
    }

    /// Install a trained codebook with the codes of the first `codes.len() / width` rows.
    /// Rows appended since are encoded here.
    pub fn install_product(
        &mut self,
        codebook: Arc<ProductCodebook>,
        mut codes: Vec<u8>,
        compression: CompressionRatio,
    ) -> Result<()> {
        if self.needs_codebook() != Some(compression) {
            return Ok(());
        }
        let width = codebook.num_subspaces.max(1);
        for offset in codes.len() / width..self.len() {
            let row = self.read_raw(offset as u32)?;
            codes.extend_from_slice(&codebook.encode(&row));
        }
        self.product = Some(ProductCodes {
            codebook,
            compression,
            codes,
        });
        self.settle_residency()
    }

    /// Move full-precision rows between RAM and disk to match the config.
    pub fn settle_residency(&mut self) -> Result<()> {
        let on_disk = self
            .quantization
            .map_or(false, |q| !q.always_ram() && self.has_codes());
        match (self.raw_in_ram(), on_disk) {
            (true, true) => {
                let disk = match &self.raw {
                    RawVectors::Ram(rows) => DiskVectors::spill(rows, self.dim, self.spill_dir.as_ref())?,
                    RawVectors::Disk(_) => return Ok(()),
                };
                tracing::debug!(rows = disk.rows, dim = self.dim, "moved full-precision vectors to disk");
                self.raw = RawVectors::Disk(disk);
            }
            (false, false) => self.load_raw()?,
            _ => {}
        }
        Ok(())
    }

    fn load_raw(&mut self) -> Result<()> {
        if let RawVectors::Disk(disk) = &self.raw {
            let rows = disk.read_all(self.dim)?;
            tracing::debug!(rows = disk.rows, dim = self.dim, "loaded full-precision vectors into RAM");
            self.raw = RawVectors::Ram(rows);
        }
        Ok(())
    }

    /// Exact scorer, available only while rows are in RAM.
    pub fn raw_scorer<'a>(&'a self, query: &'a [f32]) -> Option<Box<dyn Fn(u32) -> f32 + 'a>> {
        match &self.raw {
            RawVectors::Ram(rows) => {
                let dim = self.dim;
                let distance = self.distance;
                Some(Box::new(move |offset: u32| {
                    let start = offset as usize * dim;
                    distance.distance_exact(query, &rows[start..start + dim])
                }))
            }
            RawVectors::Disk(_) => None,
        }
    }

    /// Approximate scorer over the configured codes, if present.
    pub fn quantized_scorer<'a>(&'a self, query: &'a [f32]) -> Option<Box<dyn Fn(u32) -> f32 + 'a>> {
        match self.quantization? {
            QuantizationParams::Scalar(_) => {
                let codes = self.scalar.as_ref()?;
                let dim = self.dim;
                let distance = self.distance;
                let query_norm = norm_sq(query);
                Some(Box::new(move |offset: u32| {
                    distance.distance_asym_prenorm(query, codes.row(offset, dim), query_norm)
                }))
            }
            QuantizationParams::Product(_) => {
                let codes = self.product.as_ref()?;
                let table = codes.codebook.build_distance_table(query, self.distance);
                Some(Box::new(move |offset: u32| table.distance(codes.row(offset))))
            }
        }
    }

    /// Flat scan over full-precision rows of every live offset.
    pub fn exact_scan(&self, query: &[f32], k: usize) -> Result<Vec<(f32, u32)>> {
        flat::try_search(
            self.live_offsets(),
            |offset| {
                let row = self.read_raw(offset)?;
                Ok(self.distance.distance_exact(query, &row))
            },
            k,
        )
    }

    /// Replace approximate distances with exact ones and re-sort.
    pub fn rescore(&self, query: &[f32], candidates: &mut [(f32, u32)]) -> Result<()> {
        for (dist, offset) in candidates.iter_mut() {
            let row = self.read_raw(*offset)?;
            *dist = self.distance.distance_exact(query, &row);
        }
        candidates.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        Ok(())
    }

    /// Best available full-precision or reconstructed vector at `offset`.
    fn approx_row(&self, offset: u32) -> Cow<'_, [f32]> {
        if let RawVectors::Ram(rows) = &self.raw {
            let start = offset as usize * self.dim;
            return Cow::Borrowed(&rows[start..start + self.dim]);
        }
        if let Some(scalar) = &self.scalar {
            return Cow::Owned(scalar.row(offset, self.dim).dequantize());
        }
        if let Some(product) = &self.product {
            return Cow::Owned(product.codebook.decode(product.row(offset)));
        }
        match self.read_raw(offset) {
            Ok(row) => row,
            Err(err) => {
                tracing::warn!(offset, error = %err, "failed to read vector row");
                Cow::Owned(vec![f32::NAN; self.dim])
            }
        }
    }
}

/// Scoring used when linking rows into a live graph outside a full build.
///
/// Prefers exact rows in RAM, then the configured codes.
impl VectorSource for VectorStorage {
    fn query_scorer<'a>(&'a self, query: &'a [f32]) -> Box<dyn Fn(u32) -> f32 + 'a> {
        if let Some(scorer) = self.raw_scorer(query) {
            return scorer;
        }
        if let Some(scorer) = self.quantized_scorer(query) {
            return scorer;
        }
        Box::new(move |offset| self.distance.distance_exact(query, &self.approx_row(offset)))
    }

    fn node_scorer(&self, id: u32) -> Box<dyn Fn(u32) -> f32 + '_> {
        let node = self.approx_row(id).into_owned();
        Box::new(move |other| self.distance.distance_exact(&node, &self.approx_row(other)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{ProductQuantization, ScalarQuantization, ScalarType};

    fn scalar(always_ram: bool) -> QuantizationParams {
        QuantizationParams::Scalar(ScalarQuantization {
            kind: ScalarType::Int8,
            quantile: 1.0,
            always_ram,
        })
    }

    fn filled(n: u64, dim: usize) -> VectorStorage {
        let mut storage = VectorStorage::new(dim, Distance::Euclid, None);
        for i in 0..n {
            let v: Vec<f32> = (0..dim).map(|d| (i as f32) + d as f32 * 0.1).collect();
            storage.upsert(PointId::Num(i), &v).unwrap();
        }
        storage
    }

    #[test]
    fn test_upsert_tombstones_previous_row() {
        let mut storage = filled(3, 4);
        let (offset, previous) = storage.upsert(PointId::Num(1), &[9.0; 4]).unwrap();
        assert_eq!((offset, previous), (3, Some(1)));
        assert!(storage.is_deleted(1));
        assert_eq!(storage.live_count(), 3);
        assert_eq!(storage.len(), 4);
        assert_eq!(storage.delete(&PointId::Num(1)), Some(3));
        assert_eq!(storage.delete(&PointId::Num(1)), None);
        assert_eq!(storage.live_count(), 2);
    }

    #[test]
    fn test_exact_scan_orders_by_distance() {
        let storage = filled(10, 4);
        let top = storage.exact_scan(&[3.0, 3.1, 3.2, 3.3], 3).unwrap();
        assert_eq!(top[0].1, 3);
        assert_eq!(top.len(), 3);
    }

    #[test]
    fn test_quantized_without_always_ram_moves_rows_to_disk() {
        let mut storage = filled(20, 8);
        storage.configure(Some(&scalar(false))).unwrap();
        assert!(!storage.raw_in_ram());
        assert_eq!(storage.read_raw(5).unwrap()[0], 5.0);

        // Appends keep working on disk.
        storage.upsert(PointId::Num(100), &[7.5; 8]).unwrap();
        assert_eq!(storage.read_raw(20).unwrap().as_ref(), &[7.5; 8]);

        let query = [5.0, 5.1, 5.2, 5.3, 5.4, 5.5, 5.6, 5.7];
        let scorer = storage.quantized_scorer(&query).unwrap();
        let mut top = flat::search(storage.live_offsets(), |o| scorer(o), 4);
        storage.rescore(&query, &mut top).unwrap();
        assert_eq!(top[0].1, 5);
    }

    #[test]
    fn test_always_ram_keeps_rows_in_memory() {
        let mut storage = filled(20, 8);
        storage.configure(Some(&scalar(true))).unwrap();
        assert!(storage.raw_in_ram());
        storage.configure(Some(&scalar(false))).unwrap();
        assert!(!storage.raw_in_ram());
        storage.configure(None).unwrap();
        assert!(storage.raw_in_ram());
        assert!(storage.quantized_scorer(&[0.0; 8]).is_none());
    }

    #[test]
    fn test_product_rows_stay_in_ram_until_codebook_installed() {
        let mut storage = filled(300, 8);
        let pq = QuantizationParams::Product(ProductQuantization {
            compression: CompressionRatio::X4,
            always_ram: false,
        });
        storage.configure(Some(&pq)).unwrap();
        assert!(storage.raw_in_ram());
        assert_eq!(storage.needs_codebook(), Some(CompressionRatio::X4));

        let (rows, _) = storage.snapshot_live().unwrap();
        let codebook = ProductCodebook::train(&rows, 8, CompressionRatio::X4).unwrap();
        let codes: Vec<u8> = rows.chunks_exact(8).flat_map(|r| codebook.encode(r)).collect();
        storage.upsert(PointId::Num(999), &[1.0; 8]).unwrap();
        storage
            .install_product(Arc::new(codebook), codes, CompressionRatio::X4)
            .unwrap();

        assert!(!storage.raw_in_ram());
        assert!(storage.needs_codebook().is_none());
        let scorer = storage.quantized_scorer(&[1.0; 8]).unwrap();
        assert!(scorer(300).is_finite());
    }

    #[test]
    fn test_compaction_drops_tombstones_and_renumbers() {
        let dim = 4;
        let mut storage = filled(300, dim);
        storage.configure(Some(&scalar(false))).unwrap();
        assert!(!storage.raw_in_ram());

        for i in 0..300u64 {
            let v: Vec<f32> = (0..dim).map(|d| 1_000.0 + i as f32 + d as f32 * 0.1).collect();
            storage.upsert(PointId::Num(i), &v).unwrap();
        }
        // Exactly half the rows are tombstones: not yet over the ratio.
        assert!(!storage.needs_compaction());
        storage.delete(&PointId::Num(0));
        assert!(storage.needs_compaction());

        assert_eq!(storage.compact().unwrap(), 301);
        assert_eq!(storage.len(), 299);
        assert_eq!(storage.live_count(), 299);
        assert!(!storage.needs_compaction());
        assert!(!storage.raw_in_ram());
        assert!(storage.has_codes());

        let query = [1_005.0, 1_005.1, 1_005.2, 1_005.3];
        let top = storage.exact_scan(&query, 1).unwrap();
        assert_eq!(storage.point_id(top[0].1), PointId::Num(5));
        assert_eq!(storage.read_raw(top[0].1).unwrap()[0], 1_005.0);
        let scorer = storage.quantized_scorer(&query).unwrap();
        let mut approx = flat::search(storage.live_offsets(), |o| scorer(o), 4);
        storage.rescore(&query, &mut approx).unwrap();
        assert_eq!(storage.point_id(approx[0].1), PointId::Num(5));
    }

    #[test]
    fn test_compacted_keeps_rows_deleted_after_snapshot() {
        let mut storage = filled(10, 4);
        storage.delete(&PointId::Num(1));
        let (rows, tombstones) = storage.snapshot_live().unwrap();
        assert_eq!(rows.len(), 9 * 4);

        storage.delete(&PointId::Num(3));
        storage.upsert(PointId::Num(20), &[0.5; 4]).unwrap();
        let copy = storage.compacted(&tombstones).unwrap();
        // Row 1 is gone; row 3 stays as a tombstone at its renumbered offset.
        assert_eq!(copy.len(), 10);
        assert_eq!(copy.live_count(), 9);
        assert!(copy.is_deleted(2));
        assert_eq!(copy.point_id(2), PointId::Num(3));
        assert_eq!(copy.point_id(9), PointId::Num(20));
        assert!(!copy.contains(&PointId::Num(1)));
    }
}
